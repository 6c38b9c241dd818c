//! Filament node bus protocol
//!
//! This crate defines everything that travels over the shared half-duplex
//! node bus, layer by layer:
//!
//! ```text
//! ┌───────┬─────┬──────────────────────────────────────────────┬──────────┐
//! │ START │ LEN │ DATA                                         │ CHECKSUM │
//! │ 1B    │ 1B  │ 0–128B                                       │ 1B       │
//! └───────┴─────┴──────────────────────────────────────────────┴──────────┘
//!                 │
//!                 ▼
//!               ┌────┬─────┬─────────┬───────┬──────────────────────────┐
//!               │ ID │ LEN │ ADDRESS │ FLAGS │ PAYLOAD                  │
//!               │ 1B │ 1B  │ 2B (LE) │ 1B    │ LEN bytes                │
//!               └────┴─────┴─────────┴───────┴──────────────────────────┘
//!                                              │
//!                                              ▼
//!                                            ┌──────┬────────┬─────────┐
//!                                            │ KIND │ SOURCE │ BODY    │
//!                                            │ 1B   │ 2B(LE) │         │
//!                                            └──────┴────────┴─────────┘
//! ```
//!
//! - [`frame`]: byte-stream framing and the resynchronizing decoder
//! - [`socket`]: the addressed socket header carried inside a frame
//! - [`messages`]: the application envelope (program / time-sync)
//! - [`programs`]: program-invocation bodies (blink, fade, ...)
//! - [`timesync`]: clock synchronization messages

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;
pub mod programs;
pub mod socket;
pub mod timesync;

pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_FRAME_DATA, MAX_FRAME_SIZE};
pub use messages::{
    format_program, Envelope, Message, ProgramMessage, WireError, ALL_OUTPUTS, MAX_MESSAGE_SIZE,
};
pub use programs::{Blink, Cancel, Fade, Level, ProgramBody, TimedChange};
pub use socket::{SocketHeader, BROADCAST_ADDRESS, SOCKET_HEADER_SIZE};
pub use timesync::{SyncPhase, TimeSyncMessage};
