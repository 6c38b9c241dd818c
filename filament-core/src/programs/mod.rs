//! Built-in programs
//!
//! | Type | Program        | Kind             |
//! |------|----------------|------------------|
//! | 0x01 | blink          | tracked          |
//! | 0x02 | timed change   | tracked, ends    |
//! | 0x03 | level          | fire-and-forget  |
//! | 0x05 | fade           | tracked          |
//!
//! Type 0x00 is the cancel sentinel and is handled by the scheduler itself.

pub mod blink;
pub mod fade;
pub mod level;
pub mod timed_change;

pub use blink::BlinkState;
pub use fade::FadeState;
pub use timed_change::TimedChangeState;

use filament_protocol::programs::{PROGRAM_BLINK, PROGRAM_FADE, PROGRAM_LEVEL, PROGRAM_TIMED_CHANGE};

use crate::error::ProgramError;
use crate::output::Output;
use crate::scheduler::Registration;

/// Number of built-in registrations
pub const BUILTIN_COUNT: usize = 4;

/// Registration table for the built-in programs
pub fn builtin<D>() -> [Registration<D>; BUILTIN_COUNT] {
    [
        Registration::new(PROGRAM_BLINK, blink::setup, blink::tick),
        Registration::new(PROGRAM_TIMED_CHANGE, timed_change::setup, timed_change::tick),
        Registration::immediate(PROGRAM_LEVEL, level::tick),
        Registration::new(PROGRAM_FADE, fade::setup, fade::tick),
    ]
}

/// Color programs need an output with channels
fn require_color(output: &Output) -> Result<(), ProgramError> {
    if output.accepts_color() {
        Ok(())
    } else {
        Err(ProgramError::UnsupportedOutput)
    }
}
