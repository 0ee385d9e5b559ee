//! Control protocol type definitions
//!
//! This module defines the values exchanged in a control transaction:
//! resource identifiers, command bytes with their direction flag, and the
//! fixed control header.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit 7 of the command byte selects the transfer direction (set = read)
pub const COMMAND_READ_FLAG: u8 = 0x80;

/// Logical resource on the device
///
/// Resource 0 is reserved for meta operations such as the version query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u8);

impl ResourceId {
    /// The reserved special resource
    pub const SPECIAL: ResourceId = ResourceId(0);

    pub fn is_special(self) -> bool {
        self == Self::SPECIAL
    }
}

impl From<u8> for ResourceId {
    fn from(value: u8) -> Self {
        ResourceId(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Command selector byte
///
/// The high bit is the direction flag and the remaining seven bits select
/// the operation. The session layer always rewrites the flag before a
/// transaction, so the value supplied by callers is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(pub u8);

impl Command {
    /// Return this command with the read flag set
    pub const fn set_read(self) -> Command {
        Command(self.0 | COMMAND_READ_FLAG)
    }

    /// Return this command with the read flag cleared
    pub const fn set_write(self) -> Command {
        Command(self.0 & !COMMAND_READ_FLAG)
    }

    pub const fn is_read(self) -> bool {
        self.0 & COMMAND_READ_FLAG != 0
    }

    /// The seven operation bits, without the direction flag
    pub const fn operation(self) -> u8 {
        self.0 & !COMMAND_READ_FLAG
    }

    /// Return this command with the flag matching `direction`
    pub const fn with_direction(self, direction: Direction) -> Command {
        match direction {
            Direction::Read => self.set_read(),
            Direction::Write => self.set_write(),
        }
    }

    pub const fn direction(self) -> Direction {
        if self.is_read() {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        Command(value)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Transfer direction of a control transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Device to host (USB IN)
    Read,
    /// Host to device (USB OUT)
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Fixed control header sent with every transaction
///
/// The header is transient: it is built for one call and discarded once the
/// transfer completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlHeader {
    pub resid: ResourceId,
    pub cmd: Command,
    pub payload_len: u8,
}

impl ControlHeader {
    pub const fn new(resid: ResourceId, cmd: Command, payload_len: u8) -> Self {
        Self {
            resid,
            cmd,
            payload_len,
        }
    }

    /// Build a read header, forcing the read flag on `cmd`
    pub const fn read(resid: ResourceId, cmd: Command, payload_len: u8) -> Self {
        Self::new(resid, cmd.set_read(), payload_len)
    }

    /// Build a write header, forcing the write flag on `cmd`
    pub const fn write(resid: ResourceId, cmd: Command, payload_len: u8) -> Self {
        Self::new(resid, cmd.set_write(), payload_len)
    }

    pub const fn direction(&self) -> Direction {
        self.cmd.direction()
    }
}

/// Result code reported by the device for the last command it processed
///
/// Returned by the reserved get-last-command-status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Success,
    RegistrationFailed,
    BadCommand,
    DataLengthError,
    OtherTransportError,
    Error,
    /// A code this host does not know about
    Unknown(u8),
}

impl DeviceStatus {
    pub fn is_success(self) -> bool {
        self == DeviceStatus::Success
    }
}

impl From<u8> for DeviceStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => DeviceStatus::Success,
            1 => DeviceStatus::RegistrationFailed,
            2 => DeviceStatus::BadCommand,
            3 => DeviceStatus::DataLengthError,
            4 => DeviceStatus::OtherTransportError,
            5 => DeviceStatus::Error,
            other => DeviceStatus::Unknown(other),
        }
    }
}

impl From<DeviceStatus> for u8 {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Success => 0,
            DeviceStatus::RegistrationFailed => 1,
            DeviceStatus::BadCommand => 2,
            DeviceStatus::DataLengthError => 3,
            DeviceStatus::OtherTransportError => 4,
            DeviceStatus::Error => 5,
            DeviceStatus::Unknown(code) => code,
        }
    }
}
