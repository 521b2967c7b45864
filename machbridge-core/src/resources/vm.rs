//! Libvirt virtual machine model

use serde::Deserialize;
use tokio::sync::watch;

use crate::collection::Keyed;

/// One domain as reported by the `virsh dominfo` listing pipeline
///
/// The pipeline strips whitespace from `dominfo` output and rebuilds it
/// as JSON, so every value arrives as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct VmInfo {
    /// Domain name, the identity key
    #[serde(rename = "Name")]
    pub name: String,
    /// Domain state, e.g. `"running"` or `"shutoff"`
    #[serde(rename = "State")]
    pub state: String,
    /// Numeric domain id; `"-"` while the domain is down
    #[serde(rename = "Id", default)]
    pub id: String,
    /// Domain UUID
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    /// Guest OS type
    #[serde(rename = "OSType", default)]
    pub os_type: String,
    /// Configured maximum memory
    #[serde(rename = "Maxmemory", default)]
    pub max_memory: String,
    /// Memory currently used
    #[serde(rename = "Usedmemory", default)]
    pub used_memory: String,
    /// Whether the domain survives host reboots (`"yes"`/`"no"`)
    #[serde(rename = "Persistent", default)]
    pub persistent: String,
    /// Autostart setting
    #[serde(rename = "Autostart", default)]
    pub autostart: String,
    /// Managed save state
    #[serde(rename = "Managedsave", default)]
    pub managed_save: String,
    /// Security model
    #[serde(rename = "Securitymodel", default)]
    pub security_model: String,
    /// Security DOI
    #[serde(rename = "SecurityDOI", default)]
    pub security_doi: String,
}

/// A live virtual machine record held in an observed collection
///
/// The state field is overwritten in place on every successful poll;
/// each overwrite notifies subscribers of [`watch_state`](Self::watch_state).
#[derive(Debug)]
pub struct Vm {
    name: String,
    id: String,
    uuid: String,
    os_type: String,
    max_memory: String,
    used_memory: String,
    persistent: String,
    autostart: String,
    managed_save: String,
    security_model: String,
    security_doi: String,
    state: watch::Sender<String>,
}

impl Vm {
    /// Builds a record from a snapshot
    #[must_use]
    pub fn from_info(info: VmInfo) -> Self {
        let (state, _) = watch::channel(info.state);
        Self {
            name: info.name,
            id: info.id,
            uuid: info.uuid,
            os_type: info.os_type,
            max_memory: info.max_memory,
            used_memory: info.used_memory,
            persistent: info.persistent,
            autostart: info.autostart,
            managed_save: info.managed_save,
            security_model: info.security_model,
            security_doi: info.security_doi,
            state,
        }
    }

    /// Domain name, the identity key
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric domain id; `"-"` while the domain is down
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Domain UUID
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Guest OS type
    #[must_use]
    pub fn os_type(&self) -> &str {
        &self.os_type
    }

    /// Configured maximum memory
    #[must_use]
    pub fn max_memory(&self) -> &str {
        &self.max_memory
    }

    /// Memory currently used
    #[must_use]
    pub fn used_memory(&self) -> &str {
        &self.used_memory
    }

    /// Whether the domain survives host reboots
    #[must_use]
    pub fn persistent(&self) -> &str {
        &self.persistent
    }

    /// Autostart setting
    #[must_use]
    pub fn autostart(&self) -> &str {
        &self.autostart
    }

    /// Managed save state
    #[must_use]
    pub fn managed_save(&self) -> &str {
        &self.managed_save
    }

    /// Security model
    #[must_use]
    pub fn security_model(&self) -> &str {
        &self.security_model
    }

    /// Security DOI
    #[must_use]
    pub fn security_doi(&self) -> &str {
        &self.security_doi
    }

    /// Current domain state
    #[must_use]
    pub fn state(&self) -> String {
        self.state.borrow().clone()
    }

    /// Watches state overwrites; notified on every poll that sees the
    /// domain, including polls where the text did not change
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<String> {
        self.state.subscribe()
    }

    /// Whether the state reports the domain as running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.borrow().starts_with("running")
    }

    /// Overwrites the state in place, notifying watchers
    pub(crate) fn set_state(&self, state: String) {
        self.state.send_replace(state);
    }
}

impl Keyed for Vm {
    fn key(&self) -> &str {
        &self.name
    }
}
