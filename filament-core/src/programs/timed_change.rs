//! Show one color, switch to another after a delay, then finish

use filament_protocol::{ProgramMessage, TimedChange};

use super::require_color;
use crate::error::ProgramError;
use crate::scheduler::registration::{time_reached, MAX_DELAY_MS};
use crate::scheduler::{Install, ProgramState, Step, TickContext};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedChangeState {
    pub change_at_ms: u32,
    pub stop_color: u32,
}

pub fn setup<D>(msg: &ProgramMessage, install: &mut Install<'_, '_, D>) -> Result<(), ProgramError> {
    let params = msg
        .decode_body::<TimedChange>()
        .map_err(|_| ProgramError::InvalidBody)?;
    require_color(install.output)?;

    install.output.set_color(params.start_color);
    let change_at_ms = install
        .now_ms
        .wrapping_add(params.change_period.min(MAX_DELAY_MS));
    install.acquire_state(ProgramState::TimedChange(TimedChangeState {
        change_at_ms,
        stop_color: params.stop_color,
    }));
    Ok(())
}

pub fn tick<D>(ctx: &mut TickContext<'_, D>) -> Step {
    let (Some(output), Some(ProgramState::TimedChange(state))) =
        (ctx.output.as_deref_mut(), ctx.state.as_deref_mut())
    else {
        return Step::idle();
    };

    if !time_reached(ctx.now_ms, state.change_at_ms) {
        return Step::idle();
    }

    Step::finished(output.set_color(state.stop_color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Output, OutputKind};

    #[test]
    fn test_timed_change_finishes() {
        let msg = ProgramMessage::from_body(
            0,
            &TimedChange {
                change_period: 500,
                start_color: 0xFFFFFF,
                stop_color: 0,
            },
        )
        .unwrap();

        let mut output = Output::new(0, OutputKind::Value { pin: 5 });
        let mut driver = ();
        let mut state = None;
        let mut loan = None;
        let mut install = Install {
            output: &mut output,
            driver: &mut driver,
            now_ms: 0,
            state: &mut state,
            loan: &mut loan,
        };
        setup(&msg, &mut install).unwrap();
        assert_eq!(output.values(), [0xFF, 0, 0]);

        let mut handle = state.unwrap();

        let mut ctx = TickContext {
            now_ms: 499,
            output: Some(&mut output),
            driver: Some(&mut driver),
            state: Some(handle.get_mut()),
            input: &[],
        };
        assert_eq!(tick(&mut ctx), Step::idle());

        ctx.now_ms = 500;
        assert_eq!(tick(&mut ctx), Step::finished(true));
        drop(ctx);
        assert_eq!(output.values(), [0, 0, 0]);
    }

    #[test]
    fn test_timed_change_clamps_long_period() {
        let msg = ProgramMessage::from_body(
            0,
            &TimedChange {
                change_period: u32::MAX,
                start_color: 0xFFFFFF,
                stop_color: 0,
            },
        )
        .unwrap();

        let mut output = Output::new(0, OutputKind::Value { pin: 5 });
        let mut driver = ();
        let mut state = None;
        let mut loan = None;
        let mut install = Install {
            output: &mut output,
            driver: &mut driver,
            now_ms: 100,
            state: &mut state,
            loan: &mut loan,
        };
        setup(&msg, &mut install).unwrap();

        let mut handle = state.unwrap();
        let mut ctx = TickContext {
            now_ms: 101,
            output: Some(&mut output),
            driver: Some(&mut driver),
            state: Some(handle.get_mut()),
            input: &[],
        };
        assert_eq!(tick(&mut ctx), Step::idle());

        ctx.now_ms = 100u32.wrapping_add(MAX_DELAY_MS);
        assert_eq!(tick(&mut ctx), Step::finished(true));
    }
}
