//! Host configuration management

use crate::transport::{TransportConfig, UsbConfig};
use anyhow::{Context, Result, anyhow};
use protocol::CONTROL_VERSION;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub host: HostSettings,
    pub transport: TransportConfig,
    /// Echo self-test parameters
    #[serde(default)]
    pub selftest: SelfTestSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestSettings {
    /// Resource echoing written values
    #[serde(default = "SelfTestSettings::default_resource_id")]
    pub resource_id: u8,
    #[serde(default = "SelfTestSettings::default_iterations")]
    pub iterations: u32,
    /// Version the device firmware is expected to report
    #[serde(default = "SelfTestSettings::default_expected_version")]
    pub expected_version: u8,
    /// Pause between write and read-back
    #[serde(default = "SelfTestSettings::default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for SelfTestSettings {
    fn default() -> Self {
        Self {
            resource_id: Self::default_resource_id(),
            iterations: Self::default_iterations(),
            expected_version: Self::default_expected_version(),
            pause_ms: Self::default_pause_ms(),
        }
    }
}

impl SelfTestSettings {
    fn default_resource_id() -> u8 {
        5
    }

    fn default_iterations() -> u32 {
        4
    }

    fn default_expected_version() -> u8 {
        CONTROL_VERSION.0
    }

    fn default_pause_ms() -> u64 {
        100
    }
}

/// XMOS vendor id
pub const DEFAULT_VENDOR_ID: u16 = 0x20b1;

/// Product id of the reference control firmware
pub const DEFAULT_PRODUCT_ID: u16 = 0x0008;

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: HostSettings {
                log_level: "info".to_string(),
            },
            transport: TransportConfig::Usb(UsbConfig::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID, 0)),
            selftest: SelfTestSettings::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/device-control/host.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("device-control").join("host.toml")
        } else {
            PathBuf::from(".config/device-control/host.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !common::is_valid_log_level(&self.host.log_level) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.host.log_level,
                common::VALID_LOG_LEVELS.join(", ")
            ));
        }

        self.transport.validate()?;

        if self.selftest.iterations == 0 {
            return Err(anyhow!("Self-test iterations must be greater than 0"));
        }
        if self.selftest.iterations > u32::from(u8::MAX) + 1 {
            return Err(anyhow!(
                "Self-test iterations {} exceed the 256 distinct one-byte values",
                self.selftest.iterations
            ));
        }

        Ok(())
    }
}

/// Load configuration from a path that may start with `~`
pub fn load_config(path: &str) -> Result<HostConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    HostConfig::load(Some(path_buf))
}

/// Parse a `VID:PID` pair such as `0x20b1:0x0008` or `20b1:0008`
pub fn parse_usb_id(s: &str) -> Result<(u16, u16)> {
    let (vid, pid) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid device id '{}', expected VID:PID (e.g., '0x20b1:0x0008')", s))?;

    Ok((parse_hex_id(vid, "VID")?, parse_hex_id(pid, "PID")?))
}

fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .unwrap_or(id);

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            id
        ));
    }

    u16::from_str_radix(hex_part, 16)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
}
