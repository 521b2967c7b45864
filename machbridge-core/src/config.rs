//! Machine configuration models
//!
//! Serde models of the per-machine configuration surface: connection
//! parameters, monitor settings, and the host power policy. Loading is a
//! plain JSON file read; schema migration of older layouts is handled by
//! whoever produces the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wol::MacAddress;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file {path}: {reason}")]
    Io {
        /// Path that was attempted
        path: String,
        /// Underlying IO error
        reason: String,
    },

    /// The configuration file is not valid JSON for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A machine entry is structurally valid but semantically unusable
    #[error("machine '{machine}': {reason}")]
    Invalid {
        /// Machine identifier from the config
        machine: String,
        /// What is wrong with the entry
        reason: String,
    },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration: the set of machines to expose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Machines to monitor and control
    pub machines: Vec<MachineConfig>,
}

impl Config {
    /// Loads configuration from a JSON file
    ///
    /// # Errors
    /// Fails if the file cannot be read or does not match the schema.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// One remote machine and the facets to expose for it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    /// Identifier shown to the hub adapter
    pub id: String,
    /// Whether docker containers are listed and controlled
    #[serde(default)]
    pub enable_containers: bool,
    /// Whether libvirt domains are listed and controlled
    #[serde(default, rename = "enableVMs")]
    pub enable_vms: bool,
    /// Host connection, monitoring, and power settings
    pub host: HostConfig,
}

/// Host-level settings of a machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// How remote state is monitored
    pub monitor: MonitorConfig,
    /// Whether the host itself is exposed as a switchable facet
    #[serde(default)]
    pub publish: bool,
    /// Network address probed for reachability
    pub ip: String,
    /// Link-layer address used for wake-on-LAN, if known
    #[serde(default)]
    pub mac: Option<MacAddress>,
    /// Power policy; absent means no auto-on and no auto-off
    #[serde(default)]
    pub power: Option<PowerConfig>,
}

/// Monitoring mechanism, tagged by `type`
///
/// Only polling over SSH exists today; an unrecognized tag fails the
/// config parse, which keeps a misconfigured machine from starting in a
/// half-initialized state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorConfig {
    /// Poll the machine over SSH at a fixed interval
    #[serde(rename = "ssh+poll")]
    #[serde(rename_all = "camelCase")]
    PollOverSsh {
        /// SSH destination (`host` or `user@host`); defaults to
        /// `root@<host ip>` when absent
        #[serde(default)]
        ip: Option<String>,
        /// SSH port when not 22
        #[serde(default)]
        port: Option<u16>,
        /// Poll interval in seconds
        interval: u64,
    },
}

impl MonitorConfig {
    /// Poll interval as a duration
    #[must_use]
    pub const fn interval(&self) -> Duration {
        match self {
            Self::PollOverSsh { interval, .. } => Duration::from_secs(*interval),
        }
    }
}

/// Power policy of a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerConfig {
    /// Wake the host automatically before acting on one of its resources
    #[serde(default)]
    pub auto_on: bool,
    /// Suspend the host automatically once everything is idle
    #[serde(default)]
    pub auto_off: AutoOffConfig,
    /// How the host is switched off; defaults to suspend-to-RAM
    #[serde(default)]
    pub switch_off_mechanism: Option<SwitchOffMechanism>,
}

/// Auto-off policy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoOffConfig {
    /// Whether the idle timer is armed at all
    #[serde(default)]
    pub enabled: bool,
    /// Idle delay before the host is switched off
    #[serde(default)]
    pub seconds_delay: Option<u64>,
}

/// Mechanism used to switch a host off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchOffMechanism {
    /// Full shutdown
    #[serde(rename = "shutdown")]
    ShutDown,
    /// Suspend to RAM
    #[default]
    #[serde(rename = "suspend")]
    SuspendToRam,
    /// Suspend to disk
    #[serde(rename = "hibernate")]
    SuspendToDisk,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "machines": [
            {
                "id": "basement-server",
                "enableContainers": true,
                "enableVMs": true,
                "host": {
                    "monitor": {
                        "type": "ssh+poll",
                        "ip": "admin@10.0.0.5",
                        "interval": 15
                    },
                    "publish": true,
                    "ip": "10.0.0.5",
                    "mac": "AA:BB:CC:DD:EE:FF",
                    "power": {
                        "autoOn": true,
                        "autoOff": { "enabled": true, "secondsDelay": 300 },
                        "switchOffMechanism": "hibernate"
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_config() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.machines.len(), 1);

        let machine = &config.machines[0];
        assert_eq!(machine.id, "basement-server");
        assert!(machine.enable_containers);
        assert!(machine.enable_vms);
        assert!(machine.host.publish);
        assert_eq!(machine.host.monitor.interval(), Duration::from_secs(15));

        let power = machine.host.power.as_ref().unwrap();
        assert!(power.auto_on);
        assert!(power.auto_off.enabled);
        assert_eq!(power.auto_off.seconds_delay, Some(300));
        assert_eq!(
            power.switch_off_mechanism,
            Some(SwitchOffMechanism::SuspendToDisk)
        );
    }

    #[test]
    fn test_minimal_machine_defaults() {
        let json = r#"{
            "id": "nas",
            "host": {
                "monitor": { "type": "ssh+poll", "interval": 30 },
                "ip": "10.0.0.9"
            }
        }"#;
        let machine: MachineConfig = serde_json::from_str(json).unwrap();

        assert!(!machine.enable_containers);
        assert!(!machine.enable_vms);
        assert!(!machine.host.publish);
        assert!(machine.host.mac.is_none());
        assert!(machine.host.power.is_none());
    }

    #[test]
    fn test_unknown_monitor_type_is_rejected() {
        let json = r#"{
            "id": "nas",
            "host": {
                "monitor": { "type": "snmp", "interval": 30 },
                "ip": "10.0.0.9"
            }
        }"#;
        assert!(serde_json::from_str::<MachineConfig>(json).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.machines[0].id, "basement-server");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/machbridge.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
