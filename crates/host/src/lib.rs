//! Host-side client for the device control protocol
//!
//! Sends small command/response transactions to an embedded device over USB
//! control transfers or an SPI byte stream.
//!
//! # Example
//!
//! ```no_run
//! use host::{ControlSession, TransportConfig, UsbConfig};
//! use protocol::{Command, ResourceId};
//!
//! # fn main() -> Result<(), host::ControlError> {
//! let mut session = ControlSession::new();
//! session.init(&TransportConfig::Usb(UsbConfig::new(0x20b1, 0x0008, 0)))?;
//!
//! let version = session.query_version()?;
//! println!("device reports protocol version {}", version);
//!
//! session.write_command(ResourceId(5), Command(0), &[1])?;
//! let reply = session.read_command_vec(ResourceId(5), Command(0), 1)?;
//! assert_eq!(reply, [1]);
//!
//! session.cleanup()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod selftest;
pub mod session;
pub mod test_utils;
pub mod transport;

pub use config::{HostConfig, SelfTestSettings};
pub use error::{ControlError, InitError, Result, TransferError, TransportError};
pub use selftest::{SelfTestError, SelfTestReport, run_echo_test};
pub use session::{ControlSession, SessionState};
pub use transport::{SpiConfig, Transfer, Transport, TransportConfig, UsbConfig};
