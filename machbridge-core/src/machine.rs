//! Per-machine control
//!
//! A [`MachineController`] composes the host, container, and VM managers
//! of one configured machine and owns the cross-cutting power policy:
//! waking the host before acting on a resource (auto-on) and suspending
//! it after everything has been idle for a while (auto-off). Which facets
//! exist is decided at construction from the machine configuration, and
//! callers discover them through the capability probes or the
//! `Option`-returning facet accessors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collection::{CollectionEvent, Keyed, ObservedCollection};
use crate::command::{CommandError, CommandExecutor, SshCommandExecutor};
use crate::config::{ConfigError, ConfigResult, MachineConfig, MonitorConfig};
use crate::containers::ContainerManager;
use crate::host::HostManager;
use crate::probe::{Pinger, SystemPinger};
use crate::resources::{Container, Vm};
use crate::vms::VmManager;

/// Pause between the host answering pings and the first resource command,
/// so remote daemons have finished booting
const WAKE_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Errors raised by machine control operations
#[derive(Debug, Error)]
pub enum ControlError {
    /// The host facet is not published for this machine
    #[error("machine '{0}' does not publish its host switch")]
    HostNotPublished(String),

    /// Containers are not enabled for this machine
    #[error("machine '{0}' does not control containers")]
    ContainersDisabled(String),

    /// Virtual machines are not enabled for this machine
    #[error("machine '{0}' does not control virtual machines")]
    VmsDisabled(String),

    /// The underlying remote command failed
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Result type alias for machine control operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Controls one configured machine and its resources
pub struct MachineController {
    name: String,
    host: Arc<HostManager>,
    publish_host: bool,
    containers: Option<Arc<ContainerManager>>,
    vms: Option<Arc<VmManager>>,
    auto_on: bool,
    auto_off: Option<Arc<AutoOff>>,
    availability: Arc<watch::Sender<bool>>,
    monitoring: AtomicBool,
}

impl MachineController {
    /// Builds a controller from configuration, connecting over SSH
    ///
    /// # Errors
    /// Fails on a semantically unusable machine entry, e.g. auto-off
    /// enabled without a delay.
    pub fn new(config: &MachineConfig) -> ConfigResult<Self> {
        let MonitorConfig::PollOverSsh { ip, port, .. } = &config.host.monitor;
        // Without an explicit destination, control goes in as root
        let destination = ip
            .clone()
            .unwrap_or_else(|| format!("root@{}", config.host.ip));
        let mut executor = SshCommandExecutor::new(destination);
        if let Some(port) = port {
            executor = executor.with_port(*port);
        }

        Self::with_parts(config, Arc::new(executor), Arc::new(SystemPinger::new()))
    }

    /// Builds a controller with injected command and probe capabilities
    ///
    /// This is the constructor behind [`new`](Self::new); it exists so
    /// callers (and tests) can substitute the remote side.
    ///
    /// # Errors
    /// Fails on a semantically unusable machine entry.
    pub fn with_parts(
        config: &MachineConfig,
        executor: Arc<dyn CommandExecutor>,
        pinger: Arc<dyn Pinger>,
    ) -> ConfigResult<Self> {
        let power = config.host.power.clone().unwrap_or_default();

        let auto_off_delay = if power.auto_off.enabled {
            match power.auto_off.seconds_delay {
                Some(seconds) => Some(Duration::from_secs(seconds)),
                None => {
                    return Err(ConfigError::Invalid {
                        machine: config.id.clone(),
                        reason: "autoOff.enabled requires autoOff.secondsDelay".to_string(),
                    });
                }
            }
        } else {
            None
        };

        let interval = config.host.monitor.interval();

        // The host manager always exists: availability drives the power
        // policy even when the host switch itself is not published
        let host = Arc::new(HostManager::new(
            Arc::clone(&executor),
            pinger,
            config.host.ip.clone(),
            config.host.mac,
            power.switch_off_mechanism.unwrap_or_default(),
            interval,
        ));

        let containers = config
            .enable_containers
            .then(|| Arc::new(ContainerManager::new(Arc::clone(&executor), interval)));
        let vms = config
            .enable_vms
            .then(|| Arc::new(VmManager::new(Arc::clone(&executor), interval)));

        let auto_off = auto_off_delay.map(|delay| {
            Arc::new(AutoOff {
                machine: config.id.clone(),
                host: Arc::clone(&host),
                containers: containers.as_ref().map(|m| Arc::clone(m.collection())),
                vms: vms.as_ref().map(|m| Arc::clone(m.collection())),
                delay,
                task: Mutex::new(None),
            })
        });

        let (availability, _) = watch::channel(false);

        Ok(Self {
            name: config.id.clone(),
            host,
            publish_host: config.host.publish,
            containers,
            vms,
            auto_on: power.auto_on,
            auto_off,
            availability: Arc::new(availability),
            monitoring: AtomicBool::new(false),
        })
    }

    /// Machine identifier from the configuration
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last observed host reachability
    #[must_use]
    pub fn available(&self) -> bool {
        *self.availability.borrow()
    }

    /// Watches host reachability; only transitions are delivered
    #[must_use]
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability.subscribe()
    }

    /// Whether the host is woken automatically before resource starts
    #[must_use]
    pub fn auto_on_enabled(&self) -> bool {
        self.auto_on
    }

    /// Whether this machine publishes its host as a switchable facet
    #[must_use]
    pub fn controls_host(&self) -> bool {
        self.publish_host
    }

    /// Whether this machine lists and controls containers
    #[must_use]
    pub fn controls_containers(&self) -> bool {
        self.containers.is_some()
    }

    /// Whether this machine lists and controls virtual machines
    #[must_use]
    pub fn controls_vms(&self) -> bool {
        self.vms.is_some()
    }

    /// Host facet, present only when published
    #[must_use]
    pub fn host(&self) -> Option<&Arc<HostManager>> {
        self.publish_host.then_some(&self.host)
    }

    /// Observed containers, present only when enabled
    #[must_use]
    pub fn containers(&self) -> Option<&Arc<ObservedCollection<Container>>> {
        self.containers.as_ref().map(|m| m.collection())
    }

    /// Observed virtual machines, present only when enabled
    #[must_use]
    pub fn vms(&self) -> Option<&Arc<ObservedCollection<Vm>>> {
        self.vms.as_ref().map(|m| m.collection())
    }

    /// Starts monitoring on every constructed facet; repeated calls are
    /// no-ops
    pub fn start_monitoring(&self) {
        if self.monitoring.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(machine = %self.name, "starting monitoring");
        self.host.start_monitoring();
        if let Some(containers) = &self.containers {
            containers.start_monitoring();
        }
        if let Some(vms) = &self.vms {
            vms.start_monitoring();
        }

        // Forward host reachability, dropping repeats of the last value
        let host = Arc::clone(&self.host);
        let availability = Arc::clone(&self.availability);
        let name = self.name.clone();
        tokio::spawn(async move {
            let mut updates = host.subscribe();
            loop {
                if updates.changed().await.is_err() {
                    break;
                }
                let up = *updates.borrow_and_update();
                if up != *availability.borrow() {
                    info!(machine = %name, available = up, "availability changed");
                    availability.send_replace(up);
                }
            }
        });

        if let Some(auto_off) = &self.auto_off {
            if let Some(containers) = &auto_off.containers {
                AutoOff::watch(auto_off, containers.subscribe());
            }
            if let Some(vms) = &auto_off.vms {
                AutoOff::watch(auto_off, vms.subscribe());
            }
        }
    }

    /// Wakes the published host
    ///
    /// # Errors
    /// Fails if the host facet is not published.
    pub async fn start_host(&self) -> ControlResult<()> {
        if !self.publish_host {
            return Err(ControlError::HostNotPublished(self.name.clone()));
        }
        self.host.start().await;
        Ok(())
    }

    /// Switches the published host off
    ///
    /// # Errors
    /// Fails if the host facet is not published or the remote command
    /// fails.
    pub async fn stop_host(&self) -> ControlResult<()> {
        if !self.publish_host {
            return Err(ControlError::HostNotPublished(self.name.clone()));
        }
        self.host.stop().await?;
        Ok(())
    }

    /// Starts a container, waking the host first when auto-on applies
    ///
    /// # Errors
    /// Fails if containers are not enabled or the remote command fails.
    pub async fn start_container(&self, container: &Container) -> ControlResult<()> {
        let manager = self
            .containers
            .as_ref()
            .ok_or_else(|| ControlError::ContainersDisabled(self.name.clone()))?;
        self.ensure_host_awake().await;
        manager.start(container).await?;
        Ok(())
    }

    /// Stops a container, arming the idle timer when auto-off applies
    ///
    /// # Errors
    /// Fails if containers are not enabled or the remote command fails.
    pub async fn stop_container(&self, container: &Container) -> ControlResult<()> {
        let manager = self
            .containers
            .as_ref()
            .ok_or_else(|| ControlError::ContainersDisabled(self.name.clone()))?;
        manager.stop(container).await?;
        if let Some(auto_off) = &self.auto_off {
            auto_off.arm(Some(container), None);
        }
        Ok(())
    }

    /// Starts a virtual machine, waking the host first when auto-on
    /// applies
    ///
    /// # Errors
    /// Fails if VMs are not enabled or the remote command fails.
    pub async fn start_vm(&self, vm: &Vm) -> ControlResult<()> {
        let manager = self
            .vms
            .as_ref()
            .ok_or_else(|| ControlError::VmsDisabled(self.name.clone()))?;
        self.ensure_host_awake().await;
        manager.start(vm).await?;
        Ok(())
    }

    /// Suspends a virtual machine, arming the idle timer when auto-off
    /// applies
    ///
    /// # Errors
    /// Fails if VMs are not enabled or the remote command fails.
    pub async fn stop_vm(&self, vm: &Vm) -> ControlResult<()> {
        let manager = self
            .vms
            .as_ref()
            .ok_or_else(|| ControlError::VmsDisabled(self.name.clone()))?;
        manager.stop(vm).await?;
        if let Some(auto_off) = &self.auto_off {
            auto_off.arm(None, Some(vm));
        }
        Ok(())
    }

    /// Wakes the host and waits until it can take resource commands
    ///
    /// Requires [`start_monitoring`](Self::start_monitoring) to be
    /// running, otherwise reachability never changes and the wait will
    /// not finish.
    async fn ensure_host_awake(&self) {
        if !self.auto_on || self.host.available() {
            return;
        }

        info!(machine = %self.name, "waking host before resource start");
        self.host.start().await;

        let mut updates = self.host.subscribe();
        if updates.wait_for(|up| *up).await.is_ok() {
            tokio::time::sleep(WAKE_SETTLE_DELAY).await;
        }
    }
}

/// Idle timer switching the host off once nothing has run for a while
///
/// At most one timer is pending at a time. The running-state gate is
/// checked twice, once when arming and again when the timer fires,
/// because resources can come back during the delay window.
struct AutoOff {
    machine: String,
    host: Arc<HostManager>,
    containers: Option<Arc<ObservedCollection<Container>>>,
    vms: Option<Arc<ObservedCollection<Vm>>>,
    delay: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoOff {
    /// True when no observed resource is running, ignoring the records
    /// a stop command just completed for (their observed status lags
    /// until the next poll)
    fn idle_except(&self, skip_container: Option<&Container>, skip_vm: Option<&Vm>) -> bool {
        let containers_running = self.containers.as_ref().is_some_and(|collection| {
            collection.any(|c| {
                c.is_running() && skip_container.is_none_or(|skip| !std::ptr::eq(skip, c))
            })
        });
        let vms_running = self.vms.as_ref().is_some_and(|collection| {
            collection
                .any(|v| v.is_running() && skip_vm.is_none_or(|skip| !std::ptr::eq(skip, v)))
        });

        !containers_running && !vms_running
    }

    /// Arms the idle timer unless one is pending or something still runs
    fn arm(self: &Arc<Self>, skip_container: Option<&Container>, skip_vm: Option<&Vm>) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        if !self.idle_except(skip_container, skip_vm) {
            return;
        }

        debug!(machine = %self.machine, delay = ?self.delay, "arming idle timer");
        let auto_off = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            tokio::time::sleep(auto_off.delay).await;

            // Free the slot before acting so a later stop can re-arm even
            // when the re-check below vetoes this firing
            drop(auto_off.task.lock().unwrap().take());

            if !auto_off.idle_except(None, None) {
                debug!(machine = %auto_off.machine, "idle timer elapsed but resources are running again");
                return;
            }

            info!(machine = %auto_off.machine, "idle timer elapsed, switching host off");
            if let Err(e) = auto_off.host.stop().await {
                // The host may have gone away on its own during the delay
                debug!(machine = %auto_off.machine, error = %e, "idle switch-off failed");
            }
        }));
    }

    /// Cancels a pending idle timer, if any
    fn cancel(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
            debug!(machine = %self.machine, "idle timer canceled");
        }
    }

    /// Reacts to membership changes of one observed collection
    fn watch<T: Keyed + Send + Sync + 'static>(
        auto_off: &Arc<Self>,
        mut events: broadcast::Receiver<CollectionEvent<T>>,
    ) {
        let auto_off = Arc::clone(auto_off);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CollectionEvent::Added(_)) => auto_off.cancel(),
                    Ok(CollectionEvent::Removed(_)) => auto_off.arm(None, None),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(machine = %auto_off.machine, missed, "idle watcher lagged behind collection events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
