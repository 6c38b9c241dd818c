//! Board-agnostic core for Filament bus nodes
//!
//! This crate contains all node logic that does not depend on specific
//! hardware implementations:
//!
//! - Addressed message transport over the half-duplex bus
//! - Program scheduler and the built-in programs (blink, fade, ...)
//! - Clock synchronization state machine
//! - Output model and driver trait
//! - Configuration type definitions
//! - The [`node::Node`] router tying them together

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod node;
pub mod output;
pub mod programs;
pub mod scheduler;
pub mod sync;
pub mod transport;

pub use error::{AddressingError, AllocationError, Error, ProgramError, ProtocolError};
pub use node::{Node, NodeEvent};
pub use output::{Output, OutputDriver, OutputKind, OutputType};
pub use scheduler::{DispatchReport, Scheduler};
pub use sync::{ClockSync, SyncState};
pub use transport::{MessageSink, Packet, Transport, TransportError};
