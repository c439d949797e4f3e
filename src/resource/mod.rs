//! Desired-state resource descriptors
//!
//! Every type here is a passive description of infrastructure. Nothing in
//! this module talks to the engine; reconciliation lives in
//! [`crate::engine`].

pub mod container;
pub mod graph;
pub mod image;
pub mod network;

pub use container::{BindMount, ContainerSpec, EnvVar, MaybeSecret, PortMapping, Protocol};
pub use graph::{Output, StackGraph};
pub use image::{BuildImage, ImageSpec, PullImage};
pub use network::{NetworkDriver, NetworkSpec};
