//! Host-side error taxonomy
//!
//! Transport failures are classified once, at the driver boundary, and then
//! passed through the session unchanged.

use crate::session::SessionState;
use thiserror::Error;

/// The device or peripheral could not be opened
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    /// USB library could not be initialised or devices could not be listed
    #[error("USB error: {0}")]
    Usb(String),

    #[error("Device not found: VID={vendor_id:04x} PID={product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Failed to open device: permission denied")]
    PermissionDenied,

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {reason}")]
    InterfaceClaimFailed { interface: u8, reason: String },

    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("SPI peripheral unavailable: {0}")]
    SpiUnavailable(String),

    #[error("Transport not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// The transport attempted I/O but did not move exactly the requested bytes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer timed out")]
    Timeout,

    /// Control endpoint stalled; the device rejected the request
    #[error("Endpoint stalled")]
    Stall,

    #[error("Device disconnected")]
    NoDevice,

    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    Short { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Transfer failed: {0}")]
    Other(String),
}

/// Errors returned by a transport backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Rejected before any I/O was issued
    #[error("Payload of {requested} bytes exceeds transport maximum of {max}")]
    PayloadTooLarge { requested: usize, max: usize },

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Errors returned by the control session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Initialisation failed: {0}")]
    Init(#[from] InitError),

    /// Never sent to the device
    #[error(
        "Control transfer of {requested} bytes requested, maximum control packet size is {max}"
    )]
    DataLength { requested: usize, max: usize },

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Cannot {operation}: session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl From<TransportError> for ControlError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PayloadTooLarge { requested, max } => {
                ControlError::DataLength { requested, max }
            }
            TransportError::Transfer(e) => ControlError::Transfer(e),
        }
    }
}

/// Type alias for session results
pub type Result<T> = std::result::Result<T, ControlError>;
