//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sip: SipConfig,
    pub status_led: StatusLedConfig,
    pub external_bell: ExternalBellConfig,
    pub bell_pushes: Vec<BellPushConfig>,
    pub gpio: GpioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    /// The caller's SIP address
    pub caller: String,

    /// The callee's SIP address
    pub callee: String,

    /// How long the phone may ring before the call is abandoned
    pub max_ringing_secs: u64,

    pub server: SipServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SipServerConfig {
    /// The SIP registrar (usually the phone router)
    pub host: String,

    pub port: u16,

    /// Account to authenticate with
    pub user: String,
    pub password: String,

    /// Dump serialized requests and responses to the log
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLedConfig {
    /// GPIO number (not the physical pin) the LED is wired to
    pub gpio: u32,

    pub blink_duration_millis: u64,
    pub blink_interval_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalBellConfig {
    /// GPIO number (not the physical pin) driving the bell relay
    pub gpio: u32,

    /// How long to keep the relay closed per ring
    pub ring_duration_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BellPushConfig {
    /// A human readable label for the bell push
    pub label: String,

    /// GPIO number (not the physical pin) the push contact is wired to
    pub gpio: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Run without touching any hardware pins
    pub disabled: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl SipConfig {
    pub fn max_ringing_time(&self) -> Duration {
        Duration::from_secs(self.max_ringing_secs)
    }
}

impl StatusLedConfig {
    pub fn blink_duration(&self) -> Duration {
        Duration::from_millis(self.blink_duration_millis)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_millis)
    }
}

impl ExternalBellConfig {
    pub fn ring_duration(&self) -> Duration {
        Duration::from_millis(self.ring_duration_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sip: SipConfig::default(),
            status_led: StatusLedConfig::default(),
            external_bell: ExternalBellConfig::default(),
            bell_pushes: vec![BellPushConfig {
                label: "Front door".to_string(),
                gpio: 17,
            }],
            gpio: GpioConfig::default(),
        }
    }
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            caller: "sip:doorbell@fritz.box".to_string(),
            callee: "sip:**9@fritz.box".to_string(),
            max_ringing_secs: 15,
            server: SipServerConfig::default(),
        }
    }
}

impl Default for SipServerConfig {
    fn default() -> Self {
        Self {
            host: "fritz.box".to_string(),
            port: 5060,
            user: "doorbell".to_string(),
            password: String::new(),
            debug: false,
        }
    }
}

impl Default for StatusLedConfig {
    fn default() -> Self {
        Self {
            gpio: 22,
            blink_duration_millis: 5000,
            blink_interval_millis: 500,
        }
    }
}

impl Default for ExternalBellConfig {
    fn default() -> Self {
        Self {
            gpio: 27,
            ring_duration_millis: 2000,
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self { disabled: false }
    }
}
