//! Host availability monitoring and power control
//!
//! A [`HostManager`] owns one machine's reachability state. It probes the
//! host on a fixed interval, publishes transitions on a watch channel,
//! wakes the host over the network, and switches it off through the
//! configured mechanism.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::command::{CommandExecutor, CommandResult};
use crate::config::SwitchOffMechanism;
use crate::probe::Pinger;
use crate::wol::{self, MacAddress};

/// Monitors and controls the power state of one remote host
pub struct HostManager {
    executor: Arc<dyn CommandExecutor>,
    pinger: Arc<dyn Pinger>,
    address: String,
    mac: Option<MacAddress>,
    mechanism: SwitchOffMechanism,
    poll_interval: Duration,
    wake_broadcast: String,
    wake_port: u16,
    availability: watch::Sender<bool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl HostManager {
    /// Creates a manager for the host at `address`
    ///
    /// The host is considered unavailable until the first probe says
    /// otherwise.
    #[must_use]
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        pinger: Arc<dyn Pinger>,
        address: String,
        mac: Option<MacAddress>,
        mechanism: SwitchOffMechanism,
        poll_interval: Duration,
    ) -> Self {
        let (availability, _) = watch::channel(false);
        Self {
            executor,
            pinger,
            address,
            mac,
            mechanism,
            poll_interval,
            wake_broadcast: wol::DEFAULT_BROADCAST_ADDRESS.to_string(),
            wake_port: wol::DEFAULT_WOL_PORT,
            availability,
            monitor: Mutex::new(None),
        }
    }

    /// Overrides where the wake packet is sent, e.g. for a directed
    /// broadcast on a routed network
    #[must_use]
    pub fn with_wake_target(mut self, broadcast: impl Into<String>, port: u16) -> Self {
        self.wake_broadcast = broadcast.into();
        self.wake_port = port;
        self
    }

    /// Network address this manager probes
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last observed reachability
    #[must_use]
    pub fn available(&self) -> bool {
        *self.availability.borrow()
    }

    /// Watches reachability; only transitions are delivered
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.availability.subscribe()
    }

    /// Wakes the host if a MAC is configured and it is not reachable
    ///
    /// The wake packet has no delivery confirmation, so failures are
    /// logged and swallowed; the call returns immediately either way.
    pub async fn start(&self) {
        if self.available() {
            return;
        }
        let Some(mac) = self.mac else {
            return;
        };

        info!(host = %self.address, mac = %mac, "sending wake packet");
        if let Err(e) = wol::send_magic_packet(&mac, &self.wake_broadcast, self.wake_port) {
            debug!(host = %self.address, error = %e, "wake packet not sent");
        }
    }

    /// Switches the host off using the configured mechanism
    ///
    /// # Errors
    /// Fails if the remote switch-off command fails.
    pub async fn stop(&self) -> CommandResult<()> {
        let command = match self.mechanism {
            SwitchOffMechanism::ShutDown => "shutdown -h now &",
            SwitchOffMechanism::SuspendToRam => "pm-suspend &",
            SwitchOffMechanism::SuspendToDisk => "pm-hibernate &",
        };

        info!(host = %self.address, command, "switching host off");
        self.executor.run(command).await.map(|_| ())
    }

    /// Starts the reachability probe loop; repeated calls are no-ops
    ///
    /// A probe that errors counts as "not alive", never as a manager
    /// failure. The watch channel is only written when reachability
    /// actually changed.
    pub fn start_monitoring(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().unwrap();
        if monitor.is_some() {
            return;
        }

        let host = Arc::clone(self);
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(host.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let alive = host.pinger.probe(&host.address).await;
                if alive != host.available() {
                    info!(host = %host.address, available = alive, "reachability changed");
                    host.availability.send_replace(alive);
                }
            }
        }));
    }

    /// Stops the probe loop if it is running
    pub fn stop_monitoring(&self) {
        if let Some(task) = self.monitor.lock().unwrap().take() {
            task.abort();
        }
    }
}
