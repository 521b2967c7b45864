//! Remote resource models
//!
//! Containers and virtual machines observed on a remote host. Each
//! resource exists in two shapes: a wire snapshot deserialized from the
//! remote listing pipeline, and a live record whose status field is a
//! watch channel so holders of the record see every in-place update.

mod container;
mod vm;

pub use container::{Container, ContainerInfo, PortProtocol, PublishedPort};
pub use vm::{Vm, VmInfo};
