//! Program registrations and the contexts handed to them
//!
//! A registration pairs a program type identifier with an optional install
//! step (`setup`) and a per-cycle step (`tick`). Programs without `setup`
//! are fire-and-forget: they run once against the target output at install
//! time and leave no tracker behind.

use filament_protocol::ProgramMessage;

use super::tracker::{ProgramState, StateHandle};
use crate::error::ProgramError;
use crate::output::Output;

/// Install-time initializer
pub type SetupFn<D> = fn(&ProgramMessage, &mut Install<'_, '_, D>) -> Result<(), ProgramError>;

/// Per-cycle advance
pub type TickFn<D> = fn(&mut TickContext<'_, D>) -> Step;

/// Entry in the scheduler's program table
pub struct Registration<D> {
    pub program_type: u8,
    pub setup: Option<SetupFn<D>>,
    pub tick: TickFn<D>,
}

impl<D> Registration<D> {
    /// A program that keeps a tracker and is advanced every tick
    pub const fn new(program_type: u8, setup: SetupFn<D>, tick: TickFn<D>) -> Self {
        Self {
            program_type,
            setup: Some(setup),
            tick,
        }
    }

    /// A program applied once on install, or only run externally
    pub const fn immediate(program_type: u8, tick: TickFn<D>) -> Self {
        Self {
            program_type,
            setup: None,
            tick,
        }
    }
}

// Manual impls: fn pointers are Copy regardless of `D`
impl<D> Clone for Registration<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Registration<D> {}

/// Result of one program step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    /// The output's values changed
    pub changed: bool,
    /// The program has finished and its tracker can be released
    pub done: bool,
    /// The program could not act on its input
    pub error: Option<ProgramError>,
}

impl Step {
    /// Nothing happened
    pub const fn idle() -> Self {
        Self {
            changed: false,
            done: false,
            error: None,
        }
    }

    pub const fn changed(changed: bool) -> Self {
        Self {
            changed,
            done: false,
            error: None,
        }
    }

    pub const fn finished(changed: bool) -> Self {
        Self {
            changed,
            done: true,
            error: None,
        }
    }

    /// The program gave up; it is done and left its output untouched
    pub const fn failed(error: ProgramError) -> Self {
        Self {
            changed: false,
            done: true,
            error: Some(error),
        }
    }
}

/// Everything a program's `setup` may touch
pub struct Install<'s, 'a, D> {
    /// Target output
    pub output: &'s mut Output,
    /// Target output's driver
    pub driver: &'s mut D,
    /// Current (synchronized) time in milliseconds
    pub now_ms: u32,
    pub(crate) state: &'s mut Option<StateHandle<'a>>,
    pub(crate) loan: &'s mut Option<&'a mut ProgramState>,
}

impl<'s, 'a, D> Install<'s, 'a, D> {
    /// Acquire state storage initialized to `initial`
    ///
    /// If the caller lent a buffer to this output it is adopted and stays
    /// caller-owned; otherwise the tracker owns fresh storage.
    pub fn acquire_state(&mut self, initial: ProgramState) -> &mut ProgramState {
        let handle = match self.loan.take() {
            Some(buffer) => {
                *buffer = initial;
                StateHandle::Borrowed(buffer)
            }
            None => StateHandle::Owned(initial),
        };
        self.state.insert(handle).get_mut()
    }

    /// Whether a caller-lent buffer is waiting on this output
    pub fn has_loan(&self) -> bool {
        self.loan.is_some()
    }
}

/// Everything a program's `tick` may touch
///
/// For installed programs `output`, `driver` and (if acquired) `state` are
/// present. Fire-and-forget programs get the output and the message body
/// in `input`. External runs get only `input`.
pub struct TickContext<'t, D> {
    pub now_ms: u32,
    pub output: Option<&'t mut Output>,
    pub driver: Option<&'t mut D>,
    pub state: Option<&'t mut ProgramState>,
    pub input: &'t [u8],
}

impl<'t, D> TickContext<'t, D> {
    /// Context with no output binding
    pub fn external(now_ms: u32, input: &'t [u8]) -> Self {
        Self {
            now_ms,
            output: None,
            driver: None,
            state: None,
            input,
        }
    }
}

/// Longest delay [`time_reached`] can measure
///
/// Deadlines are compared as a signed distance from `now`, so a deadline
/// more than `i32::MAX` ms ahead would already look reached. Programs clamp
/// their periods to this (about 24.8 days).
pub const MAX_DELAY_MS: u32 = i32::MAX as u32;

/// Whether `deadline` has been reached at `now`, across counter wrap
///
/// Only meaningful for deadlines at most [`MAX_DELAY_MS`] away.
pub fn time_reached(now_ms: u32, deadline_ms: u32) -> bool {
    (now_ms.wrapping_sub(deadline_ms) as i32) >= 0
}
