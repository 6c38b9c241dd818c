//! Fade linearly between two colors
//!
//! Without the cycle flag the fade ends on the stop color. With it, the
//! direction reverses at each end and the fade never finishes.

use filament_protocol::programs::{pack_color, unpack_color};
use filament_protocol::{Fade, ProgramMessage};

use super::require_color;
use crate::error::ProgramError;
use crate::scheduler::registration::MAX_DELAY_MS;
use crate::scheduler::{Install, ProgramState, Step, TickContext};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FadeState {
    pub started_ms: u32,
    pub period: u32,
    pub from: u32,
    pub to: u32,
    pub cycle: bool,
}

/// Color `elapsed` ms into a fade of `period` ms
fn blend(from: u32, to: u32, elapsed: u32, period: u32) -> u32 {
    if period == 0 || elapsed >= period {
        return to;
    }
    let from = pack_color(from);
    let to = pack_color(to);
    let mut out = [0u8; 3];
    for i in 0..3 {
        let span = to[i] as i64 - from[i] as i64;
        out[i] = (from[i] as i64 + span * elapsed as i64 / period as i64) as u8;
    }
    unpack_color(out)
}

pub fn setup<D>(msg: &ProgramMessage, install: &mut Install<'_, '_, D>) -> Result<(), ProgramError> {
    let params = msg
        .decode_body::<Fade>()
        .map_err(|_| ProgramError::InvalidBody)?;
    require_color(install.output)?;

    install.output.set_color(params.start_color);
    let now_ms = install.now_ms;
    let period = params.period.min(MAX_DELAY_MS);
    install.acquire_state(ProgramState::Fade(FadeState {
        started_ms: now_ms,
        period,
        from: params.start_color,
        to: params.stop_color,
        // A zero-length cycle would flip every tick forever
        cycle: params.cycle && period > 0,
    }));
    Ok(())
}

pub fn tick<D>(ctx: &mut TickContext<'_, D>) -> Step {
    let (Some(output), Some(ProgramState::Fade(state))) =
        (ctx.output.as_deref_mut(), ctx.state.as_deref_mut())
    else {
        return Step::idle();
    };

    // The synchronized clock may step backwards; hold the start color then
    let elapsed = ctx.now_ms.wrapping_sub(state.started_ms) as i32;
    let elapsed = elapsed.max(0) as u32;
    if elapsed < state.period {
        let color = blend(state.from, state.to, elapsed, state.period);
        return Step::changed(output.set_color(color));
    }

    let changed = output.set_color(state.to);
    if !state.cycle {
        return Step::finished(changed);
    }

    core::mem::swap(&mut state.from, &mut state.to);
    state.started_ms = ctx.now_ms;
    Step::changed(changed)
}
