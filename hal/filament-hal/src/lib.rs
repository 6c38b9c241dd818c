//! Filament Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the node firmware core is written
//! against. Chip-specific HALs implement them; host tests implement them
//! with in-memory mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  filament-core (transport, scheduler)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  filament-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  chip HAL     │       │  host mocks   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital output (bus direction-control line)
//! - [`uart::UartTx`], [`uart::UartRx`] - Half-duplex bus serial port
//! - [`clock::Clock`] - Raw monotonic millisecond clock

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod gpio;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use clock::Clock;
pub use gpio::OutputPin;
pub use uart::{Uart, UartRx, UartTx};
