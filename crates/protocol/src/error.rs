//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding stream frames
///
/// Encoding never fails; only parsing bytes received from a stream
/// transport can.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a full header
    #[error("Incomplete header: expected {expected} bytes, got {actual}")]
    IncompleteHeader { expected: usize, actual: usize },

    /// Payload shorter than the header announced
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Payload does not fit the one-byte length field
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::IncompleteFrame {
            expected: 8,
            actual: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Incomplete frame"));
        assert!(msg.contains('8'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn test_payload_too_large_error() {
        let err = ProtocolError::PayloadTooLarge { size: 300, max: 255 };
        assert!(format!("{}", err).contains("Payload too large"));
    }
}
