//! Control header encoding
//!
//! The same `(resid, cmd, payload_len)` triple travels differently depending
//! on the transport:
//!
//! # USB
//!
//! Fields are placed in the setup packet of a vendor control transfer; no
//! extra bytes are sent.
//! ```text
//! bmRequestType = vendor | device | direction
//! bRequest      = 0
//! wValue        = cmd
//! wIndex        = resid
//! wLength       = payload_len
//! ```
//!
//! # Stream (SPI)
//!
//! The header is serialized as a fixed prefix directly followed by the payload:
//! ```text
//! [resid: u8][cmd: u8][payload_len: u8][pad: u8][payload ...]
//! ```
//!
//! Every function here is pure.

use crate::{
    error::{ProtocolError, Result},
    types::{Command, ControlHeader, Direction, ResourceId},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length of the serialized header on stream transports
pub const STREAM_HEADER_LEN: usize = 4;

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// bmRequestType for a vendor request to the device, host to device
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// bmRequestType for a vendor request to the device, device to host
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xC0;

/// bRequest is unused by the protocol
pub const CONTROL_REQUEST: u8 = 0;

/// USB control transfer setup fields for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl UsbSetup {
    pub fn direction(&self) -> Direction {
        if self.request_type & 0x80 != 0 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// Build a header for `payload_len` bytes, forcing the direction flag
///
/// Fails only when the length cannot be represented in the header.
pub fn build_header(
    resid: ResourceId,
    cmd: Command,
    direction: Direction,
    payload_len: usize,
) -> Result<ControlHeader> {
    let len = u8::try_from(payload_len).map_err(|_| ProtocolError::PayloadTooLarge {
        size: payload_len,
        max: MAX_PAYLOAD_LEN,
    })?;
    Ok(ControlHeader::new(resid, cmd.with_direction(direction), len))
}

impl ControlHeader {
    /// Place the header fields into a USB setup packet
    ///
    /// The direction of the transfer follows the command's read flag.
    pub fn usb_setup(&self) -> UsbSetup {
        let request_type = match self.direction() {
            Direction::Read => REQUEST_TYPE_VENDOR_IN,
            Direction::Write => REQUEST_TYPE_VENDOR_OUT,
        };

        UsbSetup {
            request_type,
            request: CONTROL_REQUEST,
            value: u16::from(self.cmd.0),
            index: u16::from(self.resid.0),
            length: u16::from(self.payload_len),
        }
    }

    /// Serialize the header as a stream prefix
    pub fn encode_stream(&self) -> [u8; STREAM_HEADER_LEN] {
        [self.resid.0, self.cmd.0, self.payload_len, 0]
    }

    /// Parse a stream prefix
    ///
    /// Only the first [`STREAM_HEADER_LEN`] bytes are examined; the pad byte
    /// is ignored.
    pub fn decode_stream(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < STREAM_HEADER_LEN {
            return Err(ProtocolError::IncompleteHeader {
                expected: STREAM_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..STREAM_HEADER_LEN];
        let resid = ResourceId(buf.get_u8());
        let cmd = Command(buf.get_u8());
        let payload_len = buf.get_u8();

        Ok(Self::new(resid, cmd, payload_len))
    }
}

/// Encode a header and payload as one contiguous stream frame
///
/// The header's `payload_len` is written as-is; callers build it from the
/// payload with [`build_header`].
pub fn encode_frame(header: &ControlHeader, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(STREAM_HEADER_LEN + payload.len());
    frame.put_slice(&header.encode_stream());
    frame.put_slice(payload);
    frame.freeze()
}

/// Split a stream frame into header and payload
///
/// The frame must hold at least `payload_len` bytes after the header; any
/// trailing bytes clocked in beyond that are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<(ControlHeader, &[u8])> {
    let header = ControlHeader::decode_stream(frame)?;
    let expected = STREAM_HEADER_LEN + header.payload_len as usize;

    if frame.len() < expected {
        return Err(ProtocolError::IncompleteFrame {
            expected,
            actual: frame.len(),
        });
    }

    Ok((header, &frame[STREAM_HEADER_LEN..expected]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_setup_field_placement() {
        let header = ControlHeader::write(ResourceId(5), Command(0x03), 12);
        let setup = header.usb_setup();

        assert_eq!(setup.index, 5);
        assert_eq!(setup.value, 0x03);
        assert_eq!(setup.length, 12);
        assert_eq!(setup.request, 0);
        assert_eq!(setup.request_type, REQUEST_TYPE_VENDOR_OUT);
        assert_eq!(setup.direction(), Direction::Write);
    }

    #[test]
    fn test_usb_setup_read_direction() {
        let header = ControlHeader::read(ResourceId(0), Command(0), 1);
        let setup = header.usb_setup();

        assert_eq!(setup.value, 0x80);
        assert_eq!(setup.request_type, REQUEST_TYPE_VENDOR_IN);
        assert_eq!(setup.direction(), Direction::Read);
    }

    #[test]
    fn test_stream_header_layout() {
        let header = ControlHeader::read(ResourceId(7), Command(0x12), 3);
        assert_eq!(header.encode_stream(), [7, 0x92, 3, 0]);
    }

    #[test]
    fn test_decode_short_header() {
        let err = ControlHeader::decode_stream(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::IncompleteHeader {
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_frame_layout() {
        let header = ControlHeader::write(ResourceId(5), Command(0), 2);
        let frame = encode_frame(&header, &[0xAA, 0xBB]);
        assert_eq!(&frame[..], &[5, 0, 2, 0, 0xAA, 0xBB]);

        let (decoded, payload) = decode_frame(&frame).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_decode_truncated_frame() {
        let err = decode_frame(&[5, 0, 3, 0, 1]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::IncompleteFrame {
                expected: 7,
                actual: 5
            }
        );
    }

    #[test]
    fn test_decode_frame_ignores_trailing_bytes() {
        let (_, payload) = decode_frame(&[5, 0, 1, 0, 9, 0, 0]).unwrap();
        assert_eq!(payload, &[9]);
    }

    #[test]
    fn test_build_header_rejects_oversized_length() {
        let err = build_header(ResourceId(1), Command(0), Direction::Write, 256).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLarge {
                size: 256,
                max: 255
            }
        );

        let header = build_header(ResourceId(1), Command(0x80), Direction::Write, 255).unwrap();
        assert_eq!(header.cmd, Command(0));
        assert_eq!(header.payload_len, 255);
    }
}
