//! Transport drivers
//!
//! Each physical channel implements [`Transport`], a single synchronous
//! `transact` primitive. The backend is selected at init time from a
//! [`TransportConfig`] and handed to the session as a trait object.
//!
//! Backends:
//! - USB: vendor control transfers on endpoint 0 (rusb)
//! - SPI: header-prefixed byte stream on a Raspberry Pi SPI bus (rppal, Linux only)

pub mod usb;

#[cfg(target_os = "linux")]
pub mod spi;

use crate::error::{InitError, TransportError};
use protocol::{ControlHeader, Direction, MAX_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};

pub use usb::{USB_TRANSACTION_MAX_BYTES, UsbTransport, map_rusb_error};

#[cfg(target_os = "linux")]
pub use spi::SpiTransport;

/// Payload buffer of one transaction, tagged with its direction
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Host to device
    Write(&'a [u8]),
    /// Device to host; filled by the transport
    Read(&'a mut [u8]),
}

impl Transfer<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Write(_) => Direction::Write,
            Transfer::Read(_) => Direction::Read,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Transfer::Write(data) => data.len(),
            Transfer::Read(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A physical channel carrying control transactions
///
/// One handle supports exactly one in-flight transaction; the `&mut self`
/// receiver makes callers serialize.
pub trait Transport: Send {
    /// Short backend name for logs
    fn kind(&self) -> &'static str;

    /// Largest payload a single transaction may carry
    fn max_payload_len(&self) -> usize;

    /// Run one transaction and return the number of payload bytes moved
    ///
    /// Payloads above [`Transport::max_payload_len`] must be rejected with
    /// [`TransportError::PayloadTooLarge`] before any I/O.
    fn transact(
        &mut self,
        header: &ControlHeader,
        transfer: Transfer<'_>,
    ) -> Result<usize, TransportError>;

    /// Number of transactions attempted on this handle
    fn transactions(&self) -> u64;

    /// Release the interface or peripheral
    fn close(&mut self);
}

/// Reject payloads larger than `max` before touching the channel
pub(crate) fn check_payload_len(requested: usize, max: usize) -> Result<(), TransportError> {
    if requested > max {
        tracing::warn!(
            "control transfer of {} bytes requested, maximum control packet size is {}",
            requested,
            max
        );
        return Err(TransportError::PayloadTooLarge { requested, max });
    }
    Ok(())
}

/// Transport selection and its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Usb(UsbConfig),
    Spi(SpiConfig),
}

/// USB device selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default)]
    pub interface_number: u8,
    /// Timeout of each control transfer
    #[serde(default = "UsbConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Detach an active kernel driver before claiming the interface
    #[serde(default = "UsbConfig::default_detach")]
    pub detach_kernel_driver: bool,
}

impl UsbConfig {
    pub fn new(vendor_id: u16, product_id: u16, interface_number: u8) -> Self {
        Self {
            vendor_id,
            product_id,
            interface_number,
            timeout_ms: Self::default_timeout_ms(),
            detach_kernel_driver: Self::default_detach(),
        }
    }

    fn default_timeout_ms() -> u64 {
        100
    }

    fn default_detach() -> bool {
        true
    }
}

/// Core clock feeding the BCM2835 SPI divider
pub const BCM2835_CORE_CLOCK_HZ: u32 = 250_000_000;

/// SPI peripheral settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiConfig {
    /// Clock polarity/phase mode (0-3)
    #[serde(default = "SpiConfig::default_mode")]
    pub mode: u8,
    /// Core clock divider; a power of two
    #[serde(default = "SpiConfig::default_clock_divider")]
    pub clock_divider: u32,
    /// Chip-select line (0-2)
    #[serde(default = "SpiConfig::default_chip_select")]
    pub chip_select: u8,
    #[serde(default)]
    pub bus: u8,
    /// Largest payload agreed with the device firmware
    #[serde(default = "SpiConfig::default_max_payload_len")]
    pub max_payload_len: usize,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            mode: Self::default_mode(),
            clock_divider: Self::default_clock_divider(),
            chip_select: Self::default_chip_select(),
            bus: 0,
            max_payload_len: Self::default_max_payload_len(),
        }
    }
}

impl SpiConfig {
    fn default_mode() -> u8 {
        3
    }

    fn default_clock_divider() -> u32 {
        1024
    }

    fn default_chip_select() -> u8 {
        2
    }

    fn default_max_payload_len() -> usize {
        64
    }

    /// SPI clock derived from the divider
    pub fn clock_speed_hz(&self) -> u32 {
        BCM2835_CORE_CLOCK_HZ / self.clock_divider.max(1)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.mode > 3 {
            return Err(InitError::InvalidConfig(format!(
                "SPI mode {} out of range 0-3",
                self.mode
            )));
        }
        if self.clock_divider == 0 || !self.clock_divider.is_power_of_two() {
            return Err(InitError::InvalidConfig(format!(
                "SPI clock divider {} must be a non-zero power of two",
                self.clock_divider
            )));
        }
        if self.chip_select > 2 {
            return Err(InitError::InvalidConfig(format!(
                "SPI chip select {} out of range 0-2",
                self.chip_select
            )));
        }
        if self.bus > 6 {
            return Err(InitError::InvalidConfig(format!(
                "SPI bus {} out of range 0-6",
                self.bus
            )));
        }
        if self.max_payload_len == 0 || self.max_payload_len > MAX_PAYLOAD_LEN {
            return Err(InitError::InvalidConfig(format!(
                "SPI max payload length {} out of range 1-{}",
                self.max_payload_len, MAX_PAYLOAD_LEN
            )));
        }
        Ok(())
    }
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Usb(_) => "usb",
            TransportConfig::Spi(_) => "spi",
        }
    }

    /// Check option ranges without opening anything
    pub fn validate(&self) -> Result<(), InitError> {
        match self {
            TransportConfig::Usb(usb) => {
                if usb.timeout_ms == 0 {
                    return Err(InitError::InvalidConfig(
                        "USB timeout must be greater than 0".to_string(),
                    ));
                }
                Ok(())
            }
            TransportConfig::Spi(spi) => spi.validate(),
        }
    }

    /// Open the configured channel
    pub fn open(&self) -> Result<Box<dyn Transport>, InitError> {
        self.validate()?;

        match self {
            TransportConfig::Usb(usb) => Ok(Box::new(UsbTransport::open(usb)?)),
            #[cfg(target_os = "linux")]
            TransportConfig::Spi(spi) => Ok(Box::new(SpiTransport::open(spi)?)),
            #[cfg(not(target_os = "linux"))]
            TransportConfig::Spi(_) => Err(InitError::Unsupported("SPI transport requires Linux")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_direction_and_len() {
        let data = [1u8, 2, 3];
        let write = Transfer::Write(&data);
        assert_eq!(write.direction(), Direction::Write);
        assert_eq!(write.len(), 3);

        let mut buf = [0u8; 2];
        let read = Transfer::Read(&mut buf);
        assert_eq!(read.direction(), Direction::Read);
        assert_eq!(read.len(), 2);
        assert!(!read.is_empty());
    }

    #[test]
    fn test_check_payload_len() {
        assert!(check_payload_len(64, 64).is_ok());
        assert_eq!(
            check_payload_len(65, 64),
            Err(TransportError::PayloadTooLarge {
                requested: 65,
                max: 64
            })
        );
    }

    #[test]
    fn test_spi_clock_speed() {
        let config = SpiConfig::default();
        assert_eq!(config.clock_speed_hz(), 244_140);
    }

    #[test]
    fn test_spi_validate() {
        assert!(SpiConfig::default().validate().is_ok());

        let bad_mode = SpiConfig {
            mode: 4,
            ..SpiConfig::default()
        };
        assert!(bad_mode.validate().is_err());

        let bad_divider = SpiConfig {
            clock_divider: 1000,
            ..SpiConfig::default()
        };
        assert!(bad_divider.validate().is_err());

        let zero_divider = SpiConfig {
            clock_divider: 0,
            ..SpiConfig::default()
        };
        assert!(zero_divider.validate().is_err());

        let bad_cs = SpiConfig {
            chip_select: 3,
            ..SpiConfig::default()
        };
        assert!(bad_cs.validate().is_err());

        let bad_len = SpiConfig {
            max_payload_len: 256,
            ..SpiConfig::default()
        };
        assert!(bad_len.validate().is_err());
    }

    #[test]
    fn test_usb_config_defaults() {
        let config = UsbConfig::new(0x20b1, 0x0008, 0);
        assert_eq!(config.timeout_ms, 100);
        assert!(config.detach_kernel_driver);

        let zero_timeout = TransportConfig::Usb(UsbConfig {
            timeout_ms: 0,
            ..config
        });
        assert!(matches!(
            zero_timeout.validate(),
            Err(InitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_open() {
        let config = TransportConfig::Spi(SpiConfig {
            mode: 9,
            ..SpiConfig::default()
        });
        assert!(matches!(config.open(), Err(InitError::InvalidConfig(_))));
    }
}
