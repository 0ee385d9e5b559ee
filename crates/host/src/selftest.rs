//! Echo self-test
//!
//! Writes a counter to a resource, reads it back and checks the device
//! echoed it, once per iteration. Used by the `device-control` binary to
//! exercise a freshly flashed device.

use crate::config::SelfTestSettings;
use crate::error::ControlError;
use crate::session::ControlSession;
use protocol::{Command, ResourceId, Version, VersionCheck};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SelfTestError {
    #[error("control {operation} failed: {source}")]
    Control {
        operation: &'static str,
        #[source]
        source: ControlError,
    },

    #[error(
        "control read command returned the wrong value, expected {expected}, returned {actual}"
    )]
    Mismatch { iteration: u32, expected: u8, actual: u8 },
}

/// Outcome of a completed self-test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub version: VersionCheck,
    pub iterations: u32,
}

/// Run the echo test on an initialised session
///
/// A version mismatch is reported in the result but does not stop the test.
pub fn run_echo_test(
    session: &mut ControlSession,
    settings: &SelfTestSettings,
) -> Result<SelfTestReport, SelfTestError> {
    let version = session
        .check_version(Version(settings.expected_version))
        .map_err(|source| SelfTestError::Control {
            operation: "query version",
            source,
        })?;

    if !version.is_match() {
        warn!("continuing despite version mismatch");
    }

    info!("started");

    let resid = ResourceId(settings.resource_id);
    let pause = Duration::from_millis(settings.pause_ms);
    let mut payload = [0u8; 1];

    for i in 0..settings.iterations {
        let value = i as u8;
        payload[0] = value;

        session
            .write_command(resid, Command(0).set_write(), &payload)
            .map_err(|source| SelfTestError::Control {
                operation: "write command",
                source,
            })?;

        if !pause.is_zero() {
            thread::sleep(pause);
        }

        session
            .read_command(resid, Command(0).set_read(), &mut payload)
            .map_err(|source| SelfTestError::Control {
                operation: "read command",
                source,
            })?;

        if payload[0] != value {
            return Err(SelfTestError::Mismatch {
                iteration: i,
                expected: value,
                actual: payload[0],
            });
        }

        debug!("iteration {} echoed {}", i, value);
    }

    Ok(SelfTestReport {
        version,
        iterations: settings.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    fn settings(iterations: u32) -> SelfTestSettings {
        SelfTestSettings {
            iterations,
            pause_ms: 0,
            ..SelfTestSettings::default()
        }
    }

    #[test]
    fn test_echo_passes_against_mock() {
        let (transport, probe) = MockTransport::usb();
        let mut session = ControlSession::new();
        session.init_with_transport(Box::new(transport)).unwrap();

        let report = run_echo_test(&mut session, &settings(4)).unwrap();
        assert_eq!(report.iterations, 4);
        assert!(report.version.is_match());
        // version query + 4 writes + 4 reads
        assert_eq!(probe.transact_count(), 9);
    }

    #[test]
    fn test_transfer_failure_names_operation() {
        let (transport, probe) = MockTransport::usb();
        let mut session = ControlSession::new();
        session.init_with_transport(Box::new(transport)).unwrap();
        probe.fail_with(Some(crate::error::TransferError::Timeout));

        let err = run_echo_test(&mut session, &settings(1)).unwrap_err();
        assert!(matches!(
            err,
            SelfTestError::Control {
                operation: "query version",
                ..
            }
        ));
    }
}
