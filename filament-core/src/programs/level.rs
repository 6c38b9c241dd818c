//! Set an output to a fixed level once
//!
//! Fire-and-forget: there is no setup and no tracker, the level is applied
//! straight from the message body.

use filament_protocol::programs::ProgramBody;
use filament_protocol::Level;

use crate::error::ProgramError;
use crate::scheduler::{Step, TickContext};

pub fn tick<D>(ctx: &mut TickContext<'_, D>) -> Step {
    let Some(output) = ctx.output.as_deref_mut() else {
        return Step::idle();
    };
    match Level::decode(ctx.input) {
        Ok(level) => Step::finished(output.set_level(level.value)),
        Err(_) => Step::failed(ProgramError::InvalidBody),
    }
}
