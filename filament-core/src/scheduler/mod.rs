//! Program scheduler
//!
//! Tracks which program runs on which output, installs programs from
//! incoming messages and advances every active program once per tick.

pub mod executor;
pub mod registration;
pub mod tracker;

pub use executor::{DispatchReport, Scheduler, MAX_OUTPUTS, MAX_PROGRAMS};
pub use registration::{Install, Registration, SetupFn, Step, TickContext, TickFn};
pub use tracker::{ActiveProgram, ProgramState, StateHandle, Tracker, MAX_RAW_STATE};
