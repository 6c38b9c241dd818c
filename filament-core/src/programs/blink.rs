//! Alternate between two colors

use filament_protocol::{Blink, ProgramMessage};

use super::require_color;
use crate::error::ProgramError;
use crate::scheduler::registration::time_reached;
use crate::scheduler::{Install, ProgramState, Step, TickContext};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlinkState {
    pub params: Blink,
    /// Currently showing the on color
    pub on: bool,
    pub next_change_ms: u32,
}

pub fn setup<D>(msg: &ProgramMessage, install: &mut Install<'_, '_, D>) -> Result<(), ProgramError> {
    let params = msg.decode_body::<Blink>().map_err(|_| ProgramError::InvalidBody)?;
    require_color(install.output)?;

    install.output.set_color(params.on_color);
    let next_change_ms = install.now_ms.wrapping_add(params.on_period as u32);
    install.acquire_state(ProgramState::Blink(BlinkState {
        params,
        on: true,
        next_change_ms,
    }));
    Ok(())
}

pub fn tick<D>(ctx: &mut TickContext<'_, D>) -> Step {
    let (Some(output), Some(ProgramState::Blink(state))) =
        (ctx.output.as_deref_mut(), ctx.state.as_deref_mut())
    else {
        return Step::idle();
    };

    if !time_reached(ctx.now_ms, state.next_change_ms) {
        return Step::idle();
    }

    state.on = !state.on;
    let (color, period) = if state.on {
        (state.params.on_color, state.params.on_period)
    } else {
        (state.params.off_color, state.params.off_period)
    };
    state.next_change_ms = ctx.now_ms.wrapping_add(period as u32);

    Step::changed(output.set_color(color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Output, OutputKind};
    use crate::scheduler::StateHandle;

    fn blink_msg() -> ProgramMessage {
        ProgramMessage::from_body(
            0,
            &Blink {
                on_period: 100,
                on_color: 0xFF0000,
                off_period: 50,
                off_color: 0x000000,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_blink_cycle() {
        let mut output = Output::new(0, OutputKind::Rgb { pins: [1, 2, 3] });
        let mut driver = ();
        let mut state = None;
        let mut loan = None;

        let mut install = Install {
            output: &mut output,
            driver: &mut driver,
            now_ms: 1000,
            state: &mut state,
            loan: &mut loan,
        };
        setup(&blink_msg(), &mut install).unwrap();
        assert_eq!(output.color(), 0xFF0000);

        let mut handle: StateHandle<'_> = state.unwrap();
        let mut step_at = |now_ms: u32, output: &mut Output| {
            let mut ctx = TickContext {
                now_ms,
                output: Some(output),
                driver: Some(&mut driver),
                state: Some(handle.get_mut()),
                input: &[],
            };
            tick(&mut ctx)
        };

        assert_eq!(step_at(1050, &mut output), Step::idle());
        assert_eq!(step_at(1100, &mut output), Step::changed(true));
        assert_eq!(output.color(), 0x000000);
        assert_eq!(step_at(1149, &mut output), Step::idle());
        assert_eq!(step_at(1150, &mut output), Step::changed(true));
        assert_eq!(output.color(), 0xFF0000);
    }

    #[test]
    fn test_blink_rejects_program_output() {
        let mut output = Output::new(0, OutputKind::Program);
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
        assert_eq!(
            setup(&blink_msg(), &mut install),
            Err(ProgramError::UnsupportedOutput)
        );
        assert!(state.is_none());
    }

    #[test]
    fn test_blink_rejects_bad_body() {
        let mut output = Output::new(0, OutputKind::Value { pin: 3 });
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
        let msg = ProgramMessage::new(0, 1, &[1, 2, 3]).unwrap();
        assert_eq!(setup(&msg, &mut install), Err(ProgramError::InvalidBody));
    }
}
