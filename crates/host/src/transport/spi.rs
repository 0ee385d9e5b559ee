//! SPI byte-stream transport
//!
//! SPI is a fixed point-to-point link, so there is no discovery: the
//! peripheral is configured and the header is sent in-line before the
//! payload.
//!
//! ```text
//! write: [resid][cmd][len][pad][payload ...]           -> device
//! read:  [resid][cmd][len][pad]                        -> device
//!        [payload ...]                                 <- device
//! ```

use super::{SpiConfig, Transfer, Transport, check_payload_len};
use crate::error::{InitError, TransferError, TransportError};
use protocol::{ControlHeader, STREAM_HEADER_LEN, encode_frame};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, info, warn};

/// Configured SPI peripheral
pub struct SpiTransport {
    spi: Option<Spi>,
    max_payload_len: usize,
    transactions: u64,
}

impl SpiTransport {
    pub fn open(config: &SpiConfig) -> Result<Self, InitError> {
        config.validate()?;

        let bus = map_bus(config.bus)?;
        let slave_select = map_slave_select(config.chip_select)?;
        let mode = map_mode(config.mode)?;
        let clock_speed = config.clock_speed_hz();

        let spi = Spi::new(bus, slave_select, clock_speed, mode).map_err(|e| {
            warn!("Failed to configure SPI: {}", e);
            InitError::SpiUnavailable(e.to_string())
        })?;

        info!(
            "Opened SPI bus {} chip select {} at {} Hz, mode {}",
            config.bus, config.chip_select, clock_speed, config.mode
        );

        Ok(Self {
            spi: Some(spi),
            max_payload_len: config.max_payload_len,
            transactions: 0,
        })
    }

    fn spi(&mut self) -> Result<&mut Spi, TransportError> {
        self.spi
            .as_mut()
            .ok_or_else(|| TransferError::Other("SPI peripheral closed".to_string()).into())
    }
}

impl Transport for SpiTransport {
    fn kind(&self) -> &'static str {
        "spi"
    }

    fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    fn transact(
        &mut self,
        header: &ControlHeader,
        transfer: Transfer<'_>,
    ) -> Result<usize, TransportError> {
        check_payload_len(transfer.len(), self.max_payload_len)?;

        let seq = self.transactions;
        self.transactions += 1;

        debug!(
            "{}: send {} command: {:02x?}",
            seq,
            transfer.direction(),
            header.encode_stream()
        );

        let spi = self.spi()?;
        exchange(spi, seq, header, transfer)
    }

    fn transactions(&self) -> u64 {
        self.transactions
    }

    fn close(&mut self) {
        if self.spi.take().is_some() {
            info!("Closed SPI peripheral after {} transactions", self.transactions);
        }
    }
}

/// Full-duplex byte channel underneath the transport
pub(crate) trait SpiChannel {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

impl SpiChannel for Spi {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.write(data).map_err(map_spi_error)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.read(buf).map_err(map_spi_error)
    }
}

/// Run one header-prefixed transaction and return payload bytes moved
pub(crate) fn exchange<C: SpiChannel>(
    channel: &mut C,
    seq: u64,
    header: &ControlHeader,
    transfer: Transfer<'_>,
) -> Result<usize, TransportError> {
    match transfer {
        Transfer::Write(data) => {
            let frame = encode_frame(header, data);
            let written = channel.send(&frame)?;
            if written < STREAM_HEADER_LEN {
                warn!("{}: SPI header truncated after {} bytes", seq, written);
                return Err(TransferError::Short {
                    expected: frame.len(),
                    actual: written,
                }
                .into());
            }
            Ok(written - STREAM_HEADER_LEN)
        }
        Transfer::Read(buf) => {
            let prefix = header.encode_stream();
            let written = channel.send(&prefix)?;
            if written != prefix.len() {
                warn!("{}: SPI header truncated after {} bytes", seq, written);
                return Err(TransferError::Short {
                    expected: prefix.len(),
                    actual: written,
                }
                .into());
            }
            let read = channel.receive(buf)?;
            debug!("{}: read {} bytes", seq, read);
            Ok(read)
        }
    }
}

fn map_spi_error(err: rppal::spi::Error) -> TransportError {
    warn!("SPI transfer failed: {}", err);
    match err {
        rppal::spi::Error::Io(e) => TransferError::Io(e.to_string()).into(),
        other => TransferError::Other(other.to_string()).into(),
    }
}

fn map_bus(bus: u8) -> Result<Bus, InitError> {
    Ok(match bus {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        other => {
            return Err(InitError::InvalidConfig(format!("SPI bus {} out of range", other)));
        }
    })
}

fn map_slave_select(chip_select: u8) -> Result<SlaveSelect, InitError> {
    Ok(match chip_select {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        other => {
            return Err(InitError::InvalidConfig(format!(
                "SPI chip select {} out of range",
                other
            )));
        }
    })
}

fn map_mode(mode: u8) -> Result<Mode, InitError> {
    Ok(match mode {
        0 => Mode::Mode0,
        1 => Mode::Mode1,
        2 => Mode::Mode2,
        3 => Mode::Mode3,
        other => {
            return Err(InitError::InvalidConfig(format!("SPI mode {} out of range", other)));
        }
    })
}
