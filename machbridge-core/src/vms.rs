//! Virtual machine reconciliation and control
//!
//! Mirror of the container manager for libvirt domains: poll the remote
//! host, reconcile the observed collection, and run per-domain start and
//! suspend commands. Poll failures leave the last observed state intact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::collection::{ObservedCollection, compare};
use crate::command::{CommandExecutor, CommandResult};
use crate::resources::{Vm, VmInfo};

/// Listing pipeline run on the remote host
///
/// `virsh dominfo` prints `key: value` lines; the sed passes strip the
/// whitespace and rebuild each domain as a JSON object, folded into an
/// array by jq. This exact pipeline is the contract with the remote host.
const LIST_VMS: &str = r#"virsh list --all --name | while read d; do [[ "$d" != "" ]] && virsh dominfo "$d" | tr -d ' ' | sed -e 's/^/"/g' -e 's/:/":"/g' -e 's/$/",/g'; done | sed -e 's/""/}/g' -e 's/"Id/{"Id/g' -e 's/"SecurityDOI":"\(.*\)",/"SecurityDOI":"\1"/g' -e 's/},/}/g' | jq -s"#;

/// Polls and controls the libvirt domains of one remote host
pub struct VmManager {
    executor: Arc<dyn CommandExecutor>,
    collection: Arc<ObservedCollection<Vm>>,
    poll_interval: Duration,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl VmManager {
    /// Creates a manager polling through the given executor
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, poll_interval: Duration) -> Self {
        Self {
            executor,
            collection: Arc::new(ObservedCollection::new()),
            poll_interval,
            monitor: Mutex::new(None),
        }
    }

    /// The observed domain set
    #[must_use]
    pub fn collection(&self) -> &Arc<ObservedCollection<Vm>> {
        &self.collection
    }

    /// Starts a domain by name
    ///
    /// # Errors
    /// Fails if the remote command fails.
    pub async fn start(&self, vm: &Vm) -> CommandResult<()> {
        self.executor
            .run(&format!("virsh start {}", vm.name()))
            .await
            .map(|_| ())
    }

    /// Suspends a domain to disk by name
    ///
    /// # Errors
    /// Fails if the remote command fails.
    pub async fn stop(&self, vm: &Vm) -> CommandResult<()> {
        self.executor
            .run(&format!("virsh dompmsuspend {} disk", vm.name()))
            .await
            .map(|_| ())
    }

    /// Starts the poll loop; repeated calls are no-ops
    pub fn start_monitoring(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().unwrap();
        if monitor.is_some() {
            return;
        }

        let manager = Arc::clone(self);
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.poll().await;
            }
        }));
    }

    /// Stops the poll loop if it is running
    pub fn stop_monitoring(&self) {
        if let Some(task) = self.monitor.lock().unwrap().take() {
            task.abort();
        }
    }

    /// One fetch-and-reconcile pass
    pub(crate) async fn poll(&self) {
        let output = match self.executor.run(LIST_VMS).await {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "domain listing failed, keeping last observed state");
                return;
            }
        };

        let fresh: Vec<VmInfo> = match serde_json::from_str(&output) {
            Ok(fresh) => fresh,
            Err(e) => {
                debug!(error = %e, "domain listing unparsable, keeping last observed state");
                return;
            }
        };

        let known = self.collection.snapshot();
        let diff = compare(&known, fresh, |known, info| known.name() == info.name);

        for info in diff.added {
            self.collection.insert(Vm::from_info(info));
        }
        for gone in diff.removed {
            self.collection.remove(gone.name());
        }
        for (existing, info) in diff.kept {
            existing.set_state(info.state);
        }
    }
}
