//! USB control-transfer transport
//!
//! Every transaction is a single vendor control transfer on endpoint 0; the
//! header lives entirely in the setup packet and the data stage carries the
//! raw payload.

use super::{Transfer, Transport, UsbConfig, check_payload_len};
use crate::error::{InitError, TransferError, TransportError};
use protocol::ControlHeader;
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest payload carried by one control transfer
///
/// libusb would otherwise announce any `wLength` but only send one packet of
/// data, so longer requests are refused up front.
pub const USB_TRANSACTION_MAX_BYTES: usize = 64;

/// Open USB device with one claimed interface
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
    /// Set when we detached a kernel driver that must be reattached on close
    reattach_kernel_driver: bool,
    claimed: bool,
    timeout: Duration,
    transactions: u64,
}

impl UsbTransport {
    /// Find the device by VID/PID, open it and claim the interface
    pub fn open(config: &UsbConfig) -> Result<Self, InitError> {
        let context = Context::new().map_err(|e| {
            warn!("Failed to initialise libusb: {}", e);
            InitError::Usb(format!("failed to initialise libusb: {}", e))
        })?;

        let devices = context
            .devices()
            .map_err(|e| InitError::Usb(format!("failed to list devices: {}", e)))?;

        let device = devices
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .map(|desc| {
                        desc.vendor_id() == config.vendor_id
                            && desc.product_id() == config.product_id
                    })
                    .unwrap_or(false)
            })
            .ok_or(InitError::DeviceNotFound {
                vendor_id: config.vendor_id,
                product_id: config.product_id,
            })?;

        let mut handle = device.open().map_err(|e| {
            warn!("Failed to open device: {}", e);
            match e {
                rusb::Error::Access => InitError::PermissionDenied,
                _ => InitError::OpenFailed(e.to_string()),
            }
        })?;

        debug!(
            "Opened device {:04x}:{:04x} on bus {} address {}",
            config.vendor_id,
            config.product_id,
            device.bus_number(),
            device.address()
        );

        let interface = config.interface_number;
        let mut reattach_kernel_driver = false;

        if config.detach_kernel_driver {
            match handle.kernel_driver_active(interface) {
                Ok(true) => {
                    debug!("Detaching kernel driver from interface {}", interface);
                    match handle.detach_kernel_driver(interface) {
                        Ok(()) => reattach_kernel_driver = true,
                        Err(e) => warn!(
                            "Failed to detach kernel driver from interface {}: {}",
                            interface, e
                        ),
                    }
                }
                Ok(false) => {
                    debug!("No kernel driver active on interface {}", interface);
                }
                Err(e) => {
                    debug!(
                        "Could not check kernel driver status for interface {}: {}",
                        interface, e
                    );
                }
            }
        }

        handle.claim_interface(interface).map_err(|e| {
            warn!("Failed to claim interface {}: {}", interface, e);
            InitError::InterfaceClaimFailed {
                interface,
                reason: e.to_string(),
            }
        })?;

        info!(
            "Claimed interface {} on device {:04x}:{:04x}",
            interface, config.vendor_id, config.product_id
        );

        Ok(Self {
            handle,
            interface,
            reattach_kernel_driver,
            claimed: true,
            timeout: Duration::from_millis(config.timeout_ms),
            transactions: 0,
        })
    }
}

impl Transport for UsbTransport {
    fn kind(&self) -> &'static str {
        "usb"
    }

    fn max_payload_len(&self) -> usize {
        USB_TRANSACTION_MAX_BYTES
    }

    fn transact(
        &mut self,
        header: &ControlHeader,
        transfer: Transfer<'_>,
    ) -> Result<usize, TransportError> {
        check_payload_len(transfer.len(), USB_TRANSACTION_MAX_BYTES)?;

        let setup = header.usb_setup();
        let seq = self.transactions;
        self.transactions += 1;

        debug!(
            "{}: send {} command: {:#06x} {:#06x} {:#06x}",
            seq,
            transfer.direction(),
            setup.index,
            setup.value,
            setup.length
        );

        let result = match transfer {
            Transfer::Read(buf) => self.handle.read_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                buf,
                self.timeout,
            ),
            Transfer::Write(data) => self.handle.write_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                data,
                self.timeout,
            ),
        };

        match result {
            Ok(len) => {
                debug!("{}: control transfer moved {} bytes", seq, len);
                Ok(len)
            }
            Err(e) => {
                warn!("{}: control transfer failed: {}", seq, e);
                Err(map_rusb_error(e).into())
            }
        }
    }

    fn transactions(&self) -> u64 {
        self.transactions
    }

    fn close(&mut self) {
        if !self.claimed {
            return;
        }

        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }

        if self.reattach_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.interface, e
                );
            } else {
                debug!("Reattached kernel driver to interface {}", self.interface);
            }
        }

        self.claimed = false;
        info!(
            "Released interface {} after {} transactions",
            self.interface, self.transactions
        );
    }
}

/// Classify a libusb failure
pub fn map_rusb_error(err: rusb::Error) -> TransferError {
    match err {
        rusb::Error::Timeout => TransferError::Timeout,
        rusb::Error::Pipe => TransferError::Stall,
        rusb::Error::NoDevice => TransferError::NoDevice,
        rusb::Error::Io => TransferError::Io(err.to_string()),
        rusb::Error::Overflow => {
            TransferError::Other("device sent more data than requested".to_string())
        }
        _ => TransferError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Command, REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT, ResourceId};

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), TransferError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), TransferError::Stall);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), TransferError::NoDevice);
        assert!(matches!(
            map_rusb_error(rusb::Error::Io),
            TransferError::Io(_)
        ));
        assert!(matches!(
            map_rusb_error(rusb::Error::Busy),
            TransferError::Other(_)
        ));
    }

    #[test]
    fn test_request_type_matches_libusb() {
        let vendor_in = rusb::request_type(
            rusb::Direction::In,
            rusb::RequestType::Vendor,
            rusb::Recipient::Device,
        );
        let vendor_out = rusb::request_type(
            rusb::Direction::Out,
            rusb::RequestType::Vendor,
            rusb::Recipient::Device,
        );
        assert_eq!(vendor_in, REQUEST_TYPE_VENDOR_IN);
        assert_eq!(vendor_out, REQUEST_TYPE_VENDOR_OUT);

        let setup = ControlHeader::read(ResourceId(5), Command(0), 1).usb_setup();
        assert_eq!(setup.request_type, vendor_in);
    }
}
