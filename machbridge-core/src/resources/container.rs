//! Docker container model

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::watch;

use crate::collection::Keyed;

/// Transport protocol of a published container port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    /// TCP port mapping
    Tcp,
    /// UDP port mapping
    Udp,
}

/// A host-to-container port mapping parsed from the listing pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct PublishedPort {
    /// Host interface address the port is bound to
    pub ip: String,
    /// Host side port or port range
    pub hostportrange: String,
    /// Container side port or port range
    pub containerportrange: String,
    /// Mapping protocol
    pub protocol: PortProtocol,
}

/// One container as reported by the `docker ps` listing pipeline
///
/// Identity is the first entry of `Names`; snapshots without any name
/// are discarded by the poll cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerInfo {
    /// All names attached to the container
    #[serde(rename = "Names")]
    pub names: Vec<String>,
    /// Human-readable status line, e.g. `"Up 3 minutes"`
    #[serde(rename = "Status")]
    pub status: String,
    /// Container id
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Image the container was created from
    #[serde(rename = "Image", default)]
    pub image: String,
    /// Command the container runs
    #[serde(rename = "Command", default)]
    pub command: String,
    /// Creation timestamp as printed by docker
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    /// Labels; the pipeline may map an absent label set to a null value
    #[serde(rename = "Labels", default)]
    pub labels: HashMap<String, Option<String>>,
    /// Mount points
    #[serde(rename = "Mounts", default)]
    pub mounts: Vec<String>,
    /// Networks the container is attached to
    #[serde(rename = "Networks", default)]
    pub networks: String,
    /// Published ports
    #[serde(rename = "Ports", default)]
    pub ports: Vec<PublishedPort>,
    /// Uptime as printed by docker
    #[serde(rename = "RunningFor", default)]
    pub running_for: String,
    /// Size of the container's writable layer
    #[serde(rename = "Size", default)]
    pub size: String,
    /// Number of local volumes
    #[serde(rename = "LocalVolumes", default)]
    pub local_volumes: String,
}

impl ContainerInfo {
    /// Identity of this snapshot, if it carries at least one name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

/// A live container record held in an observed collection
///
/// Everything except the status is fixed at first observation; the
/// status is overwritten in place on every successful poll and each
/// overwrite notifies subscribers of [`watch_status`](Self::watch_status).
#[derive(Debug)]
pub struct Container {
    name: String,
    names: Vec<String>,
    id: String,
    image: String,
    command: String,
    created_at: String,
    labels: HashMap<String, Option<String>>,
    mounts: Vec<String>,
    networks: String,
    ports: Vec<PublishedPort>,
    running_for: String,
    size: String,
    local_volumes: String,
    status: watch::Sender<String>,
}

impl Container {
    /// Builds a record from a snapshot; `None` if the snapshot is nameless
    #[must_use]
    pub fn from_info(info: ContainerInfo) -> Option<Self> {
        let name = info.names.first()?.clone();
        let (status, _) = watch::channel(info.status);
        Some(Self {
            name,
            names: info.names,
            id: info.id,
            image: info.image,
            command: info.command,
            created_at: info.created_at,
            labels: info.labels,
            mounts: info.mounts,
            networks: info.networks,
            ports: info.ports,
            running_for: info.running_for,
            size: info.size,
            local_volumes: info.local_volumes,
            status,
        })
    }

    /// Primary name, used as the identity key
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All names attached to the container
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Container id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Image the container was created from
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Command the container runs
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Creation timestamp as printed by docker
    #[must_use]
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// Labels attached to the container
    #[must_use]
    pub fn labels(&self) -> &HashMap<String, Option<String>> {
        &self.labels
    }

    /// Mount points
    #[must_use]
    pub fn mounts(&self) -> &[String] {
        &self.mounts
    }

    /// Networks the container is attached to
    #[must_use]
    pub fn networks(&self) -> &str {
        &self.networks
    }

    /// Published ports
    #[must_use]
    pub fn ports(&self) -> &[PublishedPort] {
        &self.ports
    }

    /// Uptime as printed by docker
    #[must_use]
    pub fn running_for(&self) -> &str {
        &self.running_for
    }

    /// Size of the container's writable layer
    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }

    /// Number of local volumes
    #[must_use]
    pub fn local_volumes(&self) -> &str {
        &self.local_volumes
    }

    /// Current status line
    #[must_use]
    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    /// Watches status overwrites; notified on every poll that sees the
    /// container, including polls where the text did not change
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    /// Whether the status line reports the container as running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.borrow().starts_with("Up ")
    }

    /// Overwrites the status in place, notifying watchers
    pub(crate) fn set_status(&self, status: String) {
        self.status.send_replace(status);
    }
}

impl Keyed for Container {
    fn key(&self) -> &str {
        &self.name
    }
}
