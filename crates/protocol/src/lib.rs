//! Protocol library for device-control
//!
//! This crate defines the control transaction format shared by every
//! transport: resource ids, command bytes with their direction flag, the
//! fixed control header and its USB and stream encodings.
//!
//! # Example
//!
//! ```
//! use protocol::{Command, ControlHeader, ResourceId};
//!
//! // Read one byte from resource 5
//! let header = ControlHeader::read(ResourceId(5), Command(0), 1);
//!
//! // USB: fields go into the setup packet
//! let setup = header.usb_setup();
//! assert_eq!(setup.index, 5);
//! assert_eq!(setup.value, 0x80);
//! assert_eq!(setup.length, 1);
//! ```
//!
//! # Stream Frames
//!
//! For SPI, the header is sent in-line ahead of the payload:
//!
//! ```
//! use protocol::{Command, ControlHeader, ResourceId, decode_frame, encode_frame};
//!
//! let header = ControlHeader::write(ResourceId(5), Command(0), 1);
//! let frame = encode_frame(&header, &[42]);
//! assert_eq!(&frame[..], &[5, 0, 1, 0, 42]);
//!
//! let (decoded, payload) = decode_frame(&frame).unwrap();
//! assert_eq!(decoded, header);
//! assert_eq!(payload, &[42]);
//! ```

pub mod codec;
pub mod error;
pub mod types;
pub mod version;

pub use codec::{
    CONTROL_REQUEST, MAX_PAYLOAD_LEN, REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT,
    STREAM_HEADER_LEN, UsbSetup, build_header, decode_frame, encode_frame,
};
pub use error::{ProtocolError, Result};
pub use types::{COMMAND_READ_FLAG, Command, ControlHeader, DeviceStatus, Direction, ResourceId};
pub use version::{
    CONTROL_GET_LAST_COMMAND_STATUS, CONTROL_GET_VERSION, CONTROL_SPECIAL_RESID, CONTROL_VERSION,
    VERSION_LEN, Version, VersionCheck,
};
