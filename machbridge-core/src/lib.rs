//! `MachBridge` Core Library
//!
//! This crate is the machine control and reconciliation core behind the
//! `MachBridge` switch bridge: it polls remote hosts over a command
//! channel, mirrors their containers and virtual machines into observed
//! collections, and serializes user start/stop intents (including the
//! auto-on and auto-off power policies) against that mirrored state.
//!
//! # Crate Structure
//!
//! - [`command`] - Remote command execution (the injected SSH boundary)
//! - [`probe`] - Host reachability probing
//! - [`wol`] - Wake-on-LAN packets and MAC addresses
//! - [`collection`] - Observed collections and snapshot diffing
//! - [`resources`] - Container and VM records
//! - [`config`] - Machine configuration models
//! - [`host`] - Host availability monitoring and power control
//! - [`containers`] / [`vms`] - Per-resource-type reconciliation managers
//! - [`machine`] - The per-machine controller and power policy

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod collection;
pub mod command;
pub mod config;
pub mod containers;
pub mod host;
pub mod machine;
pub mod probe;
pub mod resources;
pub mod vms;
pub mod wol;

#[cfg(test)]
mod test_support;

pub use collection::{CollectionEvent, Diff, Keyed, ObservedCollection, compare, difference};
pub use command::{CommandError, CommandExecutor, CommandResult, SshCommandExecutor};
pub use config::{
    AutoOffConfig, Config, ConfigError, ConfigResult, HostConfig, MachineConfig, MonitorConfig,
    PowerConfig, SwitchOffMechanism,
};
pub use containers::ContainerManager;
pub use host::HostManager;
pub use machine::{ControlError, ControlResult, MachineController};
pub use probe::{Pinger, SystemPinger};
pub use resources::{Container, ContainerInfo, PortProtocol, PublishedPort, Vm, VmInfo};
pub use vms::VmManager;
pub use wol::{
    DEFAULT_BROADCAST_ADDRESS, DEFAULT_WOL_PORT, MAGIC_PACKET_SIZE, MacAddress, WolError,
    WolResult, magic_packet, send_magic_packet,
};
