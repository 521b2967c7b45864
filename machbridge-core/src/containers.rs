//! Container reconciliation and control
//!
//! Polls the remote docker daemon through the command channel and keeps
//! an [`ObservedCollection`] of [`Container`] records in sync with it.
//! A failed or unparsable poll never touches the collection; the last
//! observed state stands until a poll succeeds again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::collection::{ObservedCollection, compare};
use crate::command::{CommandExecutor, CommandResult};
use crate::resources::{Container, ContainerInfo};

/// Listing pipeline run on the remote host
///
/// `docker ps` prints one JSON object per line; the jq program folds the
/// lines into an array and splits the comma-joined Names/Mounts/Labels/
/// Ports fields into structured values. This exact pipeline is the
/// contract with the remote host.
const LIST_CONTAINERS: &str = r#"docker ps --format '{{ json . }}' --all --no-trunc | jq -s '[.[] | .Names |= split(",") | .Mounts |= split(",") | .Labels |= (split(",") | (map( split("=") | { (.[0]) : .[1] } ) | add)) | .Ports |= (split(",") | ([.[] | capture("(?<ip>[^:]+):(?<hostportrange>[0-9-]+)->(?<containerportrange>[^/]+)/(?<protocol>[a-z]+)")]))]'"#;

/// Polls and controls the containers of one remote host
pub struct ContainerManager {
    executor: Arc<dyn CommandExecutor>,
    collection: Arc<ObservedCollection<Container>>,
    poll_interval: Duration,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ContainerManager {
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

    /// The observed container set
    #[must_use]
    pub fn collection(&self) -> &Arc<ObservedCollection<Container>> {
        &self.collection
    }

    /// Starts a container by name
    ///
    /// # Errors
    /// Fails if the remote command fails.
    pub async fn start(&self, container: &Container) -> CommandResult<()> {
        self.executor
            .run(&format!("docker start {}", container.name()))
            .await
            .map(|_| ())
    }

    /// Stops a container by name
    ///
    /// # Errors
    /// Fails if the remote command fails.
    pub async fn stop(&self, container: &Container) -> CommandResult<()> {
        self.executor
            .run(&format!("docker stop {}", container.name()))
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
            // A poll slower than the interval must not pile up concurrent
            // polls against the same collection
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
        let output = match self.executor.run(LIST_CONTAINERS).await {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "container listing failed, keeping last observed state");
                return;
            }
        };

        let parsed: Vec<ContainerInfo> = match serde_json::from_str(&output) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "container listing unparsable, keeping last observed state");
                return;
            }
        };

        // A snapshot without any name has no identity to reconcile against
        let fresh: Vec<ContainerInfo> = parsed
            .into_iter()
            .filter(|info| info.name().is_some())
            .collect();

        let known = self.collection.snapshot();
        let diff = compare(&known, fresh, |known, info| {
            Some(known.name()) == info.name()
        });

        for info in diff.added {
            if let Some(container) = Container::from_info(info) {
                self.collection.insert(container);
            }
        }
        for gone in diff.removed {
            self.collection.remove(gone.name());
        }
        for (existing, info) in diff.kept {
            existing.set_status(info.status);
        }
    }
}
