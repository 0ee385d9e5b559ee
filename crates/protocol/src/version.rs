//! Protocol version and reserved commands

use crate::types::{Command, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version identifier reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u8);

/// Version this host was built against
pub const CONTROL_VERSION: Version = Version(0x10);

/// Size in bytes of a version scalar on the wire
pub const VERSION_LEN: usize = std::mem::size_of::<u8>();

/// Resource used for meta operations
pub const CONTROL_SPECIAL_RESID: ResourceId = ResourceId::SPECIAL;

/// Reserved read command returning the protocol version
pub const CONTROL_GET_VERSION: Command = Command(0).set_read();

/// Reserved read command returning the status of the last command
pub const CONTROL_GET_LAST_COMMAND_STATUS: Command = Command(1).set_read();

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Outcome of comparing the device version against an expected one
///
/// A mismatch is advisory: the caller decides whether to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Match(Version),
    Mismatch { expected: Version, actual: Version },
}

impl VersionCheck {
    pub fn compare(expected: Version, actual: Version) -> Self {
        if expected == actual {
            VersionCheck::Match(actual)
        } else {
            VersionCheck::Mismatch { expected, actual }
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, VersionCheck::Match(_))
    }

    /// The version reported by the device
    pub fn actual(&self) -> Version {
        match *self {
            VersionCheck::Match(v) => v,
            VersionCheck::Mismatch { actual, .. } => actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_commands() {
        assert_eq!(CONTROL_GET_VERSION, Command(0x80));
        assert_eq!(CONTROL_GET_LAST_COMMAND_STATUS, Command(0x81));
        assert_eq!(CONTROL_SPECIAL_RESID, ResourceId(0));
        assert_eq!(VERSION_LEN, 1);
    }

    #[test]
    fn test_version_check() {
        let ok = VersionCheck::compare(CONTROL_VERSION, Version(0x10));
        assert!(ok.is_match());

        let bad = VersionCheck::compare(CONTROL_VERSION, Version(0x11));
        assert!(!bad.is_match());
        assert_eq!(bad.actual(), Version(0x11));
        assert_eq!(format!("{}", Version(0x11)), "0x11");
    }
}
