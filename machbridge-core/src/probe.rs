//! Host reachability probing
//!
//! Availability is defined as "answers a ping", not "accepts commands".
//! The probe is an injected capability so tests can flip reachability
//! without touching the network.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Seconds a single probe waits for a reply before giving up
const PROBE_TIMEOUT_SECS: u32 = 2;

/// Capability to check whether a host currently answers on the network
///
/// A probe never fails: any error while probing means "not alive".
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Returns `true` if `host` answered the probe
    async fn probe(&self, host: &str) -> bool;
}

/// Probes reachability by spawning the system `ping` binary
#[derive(Debug, Clone, Default)]
pub struct SystemPinger;

impl SystemPinger {
    /// Creates a pinger with the default per-probe timeout
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn probe(&self, host: &str) -> bool {
        let status = Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(PROBE_TIMEOUT_SECS.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unresolvable_host_is_not_alive() {
        let pinger = SystemPinger::new();
        assert!(!pinger.probe("invalid.host.that.does.not.exist.local").await);
    }
}
