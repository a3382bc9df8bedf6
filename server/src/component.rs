//! The building blocks of the session pipeline.

pub mod broadcaster;
pub mod common;

pub use broadcaster::Broadcaster;
pub use common::{CloseReason, Component, ConsumerPorts, PipelinePorts, Ports, PortsHandle};
