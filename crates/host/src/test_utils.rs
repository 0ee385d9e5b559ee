//! Test utilities for device-control
//!
//! Provides an in-memory [`Transport`] that behaves like a simple device:
//! writes to a resource are stored and echoed back by the next read of the
//! same resource and operation. Every call is recorded so tests can check
//! exactly what reached the transport layer.
//!
//! # Example
//!
//! ```
//! use host::{ControlSession, test_utils::MockTransport};
//! use protocol::{Command, ResourceId};
//!
//! let (transport, probe) = MockTransport::usb();
//! let mut session = ControlSession::new();
//! session.init_with_transport(Box::new(transport)).unwrap();
//!
//! session.write_command(ResourceId(5), Command(0), &[7]).unwrap();
//! let mut buf = [0u8; 1];
//! session.read_command(ResourceId(5), Command(0), &mut buf).unwrap();
//! assert_eq!(buf, [7]);
//! assert_eq!(probe.transact_count(), 2);
//! ```

use crate::error::{TransferError, TransportError};
use crate::transport::{Transfer, Transport, USB_TRANSACTION_MAX_BYTES, check_payload_len};
use protocol::{
    CONTROL_GET_LAST_COMMAND_STATUS, CONTROL_GET_VERSION, CONTROL_VERSION, ControlHeader,
    DeviceStatus, Direction, ResourceId, Version,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One call that reached [`Transport::transact`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransaction {
    pub header: ControlHeader,
    pub direction: Direction,
    pub len: usize,
    /// Bytes sent, for writes
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    kind: &'static str,
    max_payload_len: usize,
    version: Version,
    last_status: DeviceStatus,
    /// Stored payloads keyed by resource and operation bits
    registers: HashMap<(ResourceId, u8), Vec<u8>>,
    /// Every entry into `transact`, including rejected ones
    transact_calls: usize,
    calls: Vec<RecordedTransaction>,
    /// Bytes withheld from every transfer to simulate short transfers
    short_by: usize,
    fail_with: Option<TransferError>,
    closed: bool,
}

/// In-memory echo device
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Handle for inspecting and steering a [`MockTransport`] after it was
/// moved into a session
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Mock with an arbitrary payload ceiling
    pub fn new(kind: &'static str, max_payload_len: usize) -> (Self, MockProbe) {
        let state = Arc::new(Mutex::new(MockState {
            kind,
            max_payload_len,
            version: CONTROL_VERSION,
            last_status: DeviceStatus::Success,
            registers: HashMap::new(),
            transact_calls: 0,
            calls: Vec::new(),
            short_by: 0,
            fail_with: None,
            closed: false,
        }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockProbe { state },
        )
    }

    /// Mock with the USB control-transfer ceiling
    pub fn usb() -> (Self, MockProbe) {
        Self::new("mock-usb", USB_TRANSACTION_MAX_BYTES)
    }

    /// Mock with a negotiated SPI ceiling
    pub fn spi(max_payload_len: usize) -> (Self, MockProbe) {
        Self::new("mock-spi", max_payload_len)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> &'static str {
        self.lock().kind
    }

    fn max_payload_len(&self) -> usize {
        self.lock().max_payload_len
    }

    fn transact(
        &mut self,
        header: &ControlHeader,
        transfer: Transfer<'_>,
    ) -> Result<usize, TransportError> {
        let mut state = self.lock();
        state.transact_calls += 1;
        check_payload_len(transfer.len(), state.max_payload_len)?;

        let data = match &transfer {
            Transfer::Write(data) => data.to_vec(),
            Transfer::Read(_) => Vec::new(),
        };
        state.calls.push(RecordedTransaction {
            header: *header,
            direction: transfer.direction(),
            len: transfer.len(),
            data,
        });

        if let Some(err) = state.fail_with.clone() {
            state.last_status = DeviceStatus::OtherTransportError;
            return Err(err.into());
        }

        let key = (header.resid, header.cmd.operation());
        let moved = match transfer {
            Transfer::Write(data) => {
                state.registers.insert(key, data.to_vec());
                data.len()
            }
            Transfer::Read(buf) => {
                if header.resid.is_special() && header.cmd == CONTROL_GET_VERSION {
                    buf.fill(0);
                    if let Some(first) = buf.first_mut() {
                        *first = state.version.0;
                    }
                    buf.len()
                } else if header.resid.is_special()
                    && header.cmd == CONTROL_GET_LAST_COMMAND_STATUS
                {
                    buf.fill(0);
                    if let Some(first) = buf.first_mut() {
                        *first = u8::from(state.last_status);
                    }
                    buf.len()
                } else {
                    match state.registers.get(&key) {
                        Some(stored) => {
                            let n = stored.len().min(buf.len());
                            buf[..n].copy_from_slice(&stored[..n]);
                            n
                        }
                        None => {
                            buf.fill(0);
                            buf.len()
                        }
                    }
                }
            }
        };

        state.last_status = DeviceStatus::Success;
        Ok(moved.saturating_sub(state.short_by))
    }

    fn transactions(&self) -> u64 {
        self.lock().transact_calls as u64
    }

    fn close(&mut self) {
        self.lock().closed = true;
    }
}

impl MockProbe {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of calls that reached the transport, accepted or not
    pub fn transact_count(&self) -> usize {
        self.lock().transact_calls
    }

    /// Calls that passed the payload ceiling
    pub fn calls(&self) -> Vec<RecordedTransaction> {
        self.lock().calls.clone()
    }

    pub fn last_call(&self) -> Option<RecordedTransaction> {
        self.lock().calls.last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Version reported for the get-version command
    pub fn set_version(&self, version: Version) {
        self.lock().version = version;
    }

    /// Report every transfer as `n` bytes shorter than requested
    pub fn set_short_by(&self, n: usize) {
        self.lock().short_by = n;
    }

    /// Fail every transfer with `err`; `None` restores normal behaviour
    pub fn fail_with(&self, err: Option<TransferError>) {
        self.lock().fail_with = err;
    }

    /// Preload the value returned by reads of `resid`/`operation`
    pub fn set_register(&self, resid: ResourceId, operation: u8, value: Vec<u8>) {
        self.lock().registers.insert((resid, operation & 0x7f), value);
    }
}
