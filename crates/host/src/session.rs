//! Control session
//!
//! Transport-agnostic request/response API. A session moves through
//! `Uninitialized -> Ready -> Closed`; transactions are only accepted while
//! `Ready`.
//!
//! Every transaction is validated against the transport's payload ceiling
//! before the transport is touched, because some transports silently
//! truncate oversized transfers.

use crate::error::{ControlError, Result, TransferError};
use crate::transport::{Transfer, Transport, TransportConfig};
use protocol::{
    CONTROL_GET_LAST_COMMAND_STATUS, CONTROL_GET_VERSION, CONTROL_SPECIAL_RESID, Command,
    DeviceStatus, ResourceId, VERSION_LEN, Version, VersionCheck, build_header,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`ControlSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Host side of the control protocol for one device
///
/// The session is single-threaded and blocking. Callers that need shared
/// access must wrap it in a mutex.
pub struct ControlSession {
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
}

impl Default for ControlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            transport: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open the transport described by `config`
    ///
    /// On failure the session stays uninitialized.
    pub fn init(&mut self, config: &TransportConfig) -> Result<()> {
        self.expect_state(SessionState::Uninitialized, "init")?;

        let transport = config.open().map_err(|e| {
            warn!("control init over {} failed: {}", config.kind(), e);
            ControlError::Init(e)
        })?;

        self.init_with_transport(transport)
    }

    /// Use an already opened transport
    pub fn init_with_transport(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.expect_state(SessionState::Uninitialized, "init")?;

        info!(
            "control session ready over {} (max payload {} bytes)",
            transport.kind(),
            transport.max_payload_len()
        );
        self.transport = Some(transport);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Largest payload the active transport accepts
    pub fn max_payload_len(&self) -> Option<usize> {
        self.transport.as_ref().map(|t| t.max_payload_len())
    }

    /// Read the protocol version from the special resource
    pub fn query_version(&mut self) -> Result<Version> {
        let mut buf = [0u8; VERSION_LEN];
        self.transact(
            "query version",
            CONTROL_SPECIAL_RESID,
            CONTROL_GET_VERSION,
            Transfer::Read(&mut buf),
        )?;

        let version = Version(buf[0]);
        debug!("version returned: {}", version);
        Ok(version)
    }

    /// Query the version and compare it with `expected`
    ///
    /// A mismatch is logged and returned, not raised as an error.
    pub fn check_version(&mut self, expected: Version) -> Result<VersionCheck> {
        let actual = self.query_version()?;
        let check = VersionCheck::compare(expected, actual);

        if let VersionCheck::Mismatch { expected, actual } = check {
            warn!("version expected {}, received {}", expected, actual);
        }

        Ok(check)
    }

    /// Read the device's result code for the previous command
    pub fn last_command_status(&mut self) -> Result<DeviceStatus> {
        let mut buf = [0u8; 1];
        self.transact(
            "query last command status",
            CONTROL_SPECIAL_RESID,
            CONTROL_GET_LAST_COMMAND_STATUS,
            Transfer::Read(&mut buf),
        )?;

        Ok(DeviceStatus::from(buf[0]))
    }

    /// Send `payload` to `resid`
    ///
    /// The read flag of `cmd` is cleared.
    pub fn write_command(&mut self, resid: ResourceId, cmd: Command, payload: &[u8]) -> Result<()> {
        self.transact("write command", resid, cmd, Transfer::Write(payload))
    }

    /// Fill `payload` from `resid`
    ///
    /// The read flag of `cmd` is set. The payload is returned as-is; its
    /// meaning is up to the caller.
    pub fn read_command(
        &mut self,
        resid: ResourceId,
        cmd: Command,
        payload: &mut [u8],
    ) -> Result<()> {
        self.transact("read command", resid, cmd, Transfer::Read(payload))
    }

    /// Read `payload_len` bytes from `resid` into a new buffer
    pub fn read_command_vec(
        &mut self,
        resid: ResourceId,
        cmd: Command,
        payload_len: usize,
    ) -> Result<Vec<u8>> {
        // Checked before allocating so a huge length never reaches the heap
        self.check_len("read command", payload_len)?;

        let mut payload = vec![0u8; payload_len];
        self.read_command(resid, cmd, &mut payload)?;
        Ok(payload)
    }

    /// Release the transport; no transaction may follow
    pub fn cleanup(&mut self) -> Result<()> {
        self.expect_state(SessionState::Ready, "cleanup")?;

        if let Some(mut transport) = self.transport.take() {
            transport.close();
            debug!(
                "control session closed after {} transactions",
                transport.transactions()
            );
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    fn expect_state(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            warn!("cannot {}: session is {}", operation, self.state);
            return Err(ControlError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn check_len(&self, operation: &'static str, requested: usize) -> Result<usize> {
        self.expect_state(SessionState::Ready, operation)?;

        let max = self.max_payload_len().unwrap_or(0);
        if requested > max {
            warn!(
                "control transfer of {} bytes requested, maximum control packet size is {}",
                requested, max
            );
            return Err(ControlError::DataLength { requested, max });
        }
        Ok(max)
    }

    fn transact(
        &mut self,
        operation: &'static str,
        resid: ResourceId,
        cmd: Command,
        transfer: Transfer<'_>,
    ) -> Result<()> {
        let requested = transfer.len();
        let max = self.check_len(operation, requested)?;

        let header = build_header(resid, cmd, transfer.direction(), requested)
            .map_err(|_| ControlError::DataLength { requested, max })?;

        let transport = self
            .transport
            .as_mut()
            .ok_or(ControlError::InvalidState {
                operation,
                state: self.state,
            })?;

        let transferred = transport.transact(&header, transfer)?;
        if transferred != requested {
            warn!(
                "{} on resource {} cmd {} moved {} of {} bytes",
                operation, resid, header.cmd, transferred, requested
            );
            return Err(TransferError::Short {
                expected: requested,
                actual: transferred,
            }
            .into());
        }

        Ok(())
    }
}

impl Drop for ControlSession {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("closing {} transport on drop", transport.kind());
            transport.close();
        }
    }
}

impl fmt::Debug for ControlSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSession")
            .field("state", &self.state)
            .field("transport", &self.transport.as_ref().map(|t| t.kind()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    #[test]
    fn test_new_session_is_uninitialized() {
        let session = ControlSession::new();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.max_payload_len(), None);
    }

    #[test]
    fn test_transaction_before_init_rejected() {
        let mut session = ControlSession::new();
        let err = session.query_version().unwrap_err();
        assert_eq!(
            err,
            ControlError::InvalidState {
                operation: "query version",
                state: SessionState::Uninitialized
            }
        );
    }

    #[test]
    fn test_double_init_rejected() {
        let mut session = ControlSession::new();
        let (transport, _probe) = MockTransport::usb();
        session.init_with_transport(Box::new(transport)).unwrap();

        let (second, _) = MockTransport::usb();
        assert!(matches!(
            session.init_with_transport(Box::new(second)),
            Err(ControlError::InvalidState {
                state: SessionState::Ready,
                ..
            })
        ));
    }

    #[test]
    fn test_cleanup_closes_transport() {
        let mut session = ControlSession::new();
        let (transport, probe) = MockTransport::usb();
        session.init_with_transport(Box::new(transport)).unwrap();

        session.cleanup().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(probe.is_closed());
        assert!(session.cleanup().is_err());
    }

    #[test]
    fn test_drop_closes_transport() {
        let (transport, probe) = MockTransport::usb();
        {
            let mut session = ControlSession::new();
            session.init_with_transport(Box::new(transport)).unwrap();
        }
        assert!(probe.is_closed());
    }

    #[test]
    fn test_read_command_vec_checks_length_first() {
        let mut session = ControlSession::new();
        let (transport, probe) = MockTransport::usb();
        session.init_with_transport(Box::new(transport)).unwrap();

        let err = session
            .read_command_vec(ResourceId(5), Command(0), usize::MAX)
            .unwrap_err();
        assert!(matches!(err, ControlError::DataLength { .. }));
        assert_eq!(probe.transact_count(), 0);
    }
}
