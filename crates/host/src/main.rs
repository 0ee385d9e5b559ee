//! device-control host
//!
//! Opens a device over USB or SPI, checks its protocol version and runs the
//! echo self-test against one resource.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use host::config::{self, HostConfig};
use host::{ControlSession, SpiConfig, TransportConfig, UsbConfig, run_echo_test};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "device-control")]
#[command(
    author,
    version,
    about = "Device control host - exercise a device over USB or SPI"
)]
#[command(long_about = "
Host-side client for the device control protocol. Opens the configured
transport, queries the protocol version and runs a write/read echo test.

EXAMPLES:
    # Run with default config
    device-control

    # Talk to a specific USB device
    device-control --usb 0x20b1:0x0008 --interface 3

    # Use SPI on a Raspberry Pi with default mode and divider
    device-control --spi

    # Run with debug logging to see every transaction
    device-control --log-level debug

CONFIGURATION:
    The host looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/device-control/host.toml
    3. /etc/device-control/host.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Use the USB device with this VID:PID
    #[arg(long, value_name = "VID:PID", conflicts_with = "spi")]
    usb: Option<String>,

    /// USB interface number to claim
    #[arg(long, value_name = "N", requires = "usb")]
    interface: Option<u8>,

    /// Use the SPI transport with default settings
    #[arg(long)]
    spi: bool,

    /// Number of echo iterations
    #[arg(short = 'n', long, value_name = "COUNT")]
    iterations: Option<u32>,

    /// Resource id used for the echo test
    #[arg(short, long, value_name = "ID")]
    resource: Option<u8>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = HostConfig::default();
        let path = HostConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        config::load_config(path).context("Failed to load configuration")?
    } else {
        HostConfig::load_or_default()
    };

    apply_overrides(&mut config, &args)?;

    let log_level = config.host.log_level.as_str();

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("device-control host v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let result = run(&config);
    if let Err(ref e) = result {
        error!("{:#}", e);
    }
    result
}

fn apply_overrides(config: &mut HostConfig, args: &Args) -> Result<()> {
    if let Some(ref id) = args.usb {
        let (vendor_id, product_id) = config::parse_usb_id(id)?;
        config.transport = TransportConfig::Usb(UsbConfig::new(
            vendor_id,
            product_id,
            args.interface.unwrap_or(0),
        ));
    } else if args.spi {
        config.transport = TransportConfig::Spi(SpiConfig::default());
    }

    if let Some(iterations) = args.iterations {
        config.selftest.iterations = iterations;
    }
    if let Some(resource) = args.resource {
        config.selftest.resource_id = resource;
    }
    if let Some(ref level) = args.log_level {
        config.host.log_level = level.clone();
    }

    config.validate()
}

fn run(config: &HostConfig) -> Result<()> {
    let mut session = ControlSession::new();
    session
        .init(&config.transport)
        .context("control init failed")?;

    info!("device found");

    let report = run_echo_test(&mut session, &config.selftest);

    session.cleanup().context("control cleanup failed")?;

    let report = report?;
    info!(
        "done: {} iterations, device version {}",
        report.iterations,
        report.version.actual()
    );
    Ok(())
}
