//! Per-output execution records
//!
//! Each output slot owns exactly one tracker for the lifetime of the
//! process. Installing a program resets the tracker's contents; the record
//! itself is never freed.

use heapless::Vec;

use crate::programs::{BlinkState, FadeState, TimedChangeState};

/// Capacity of free-form program state
pub const MAX_RAW_STATE: usize = 16;

/// Execution state of a running program
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramState {
    Blink(BlinkState),
    TimedChange(TimedChangeState),
    Fade(FadeState),
    /// Free-form bytes for programs registered outside this crate
    Raw(Vec<u8, MAX_RAW_STATE>),
}

/// Where a tracker's state lives
///
/// Owned state is dropped with the tracker. Borrowed state belongs to the
/// caller that lent it and is handed back on release.
#[derive(Debug)]
pub enum StateHandle<'a> {
    Owned(ProgramState),
    Borrowed(&'a mut ProgramState),
}

impl<'a> StateHandle<'a> {
    pub fn get(&self) -> &ProgramState {
        match self {
            StateHandle::Owned(state) => state,
            StateHandle::Borrowed(state) => state,
        }
    }

    pub fn get_mut(&mut self) -> &mut ProgramState {
        match self {
            StateHandle::Owned(state) => state,
            StateHandle::Borrowed(state) => state,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, StateHandle::Owned(_))
    }
}

/// The program bound to a tracker
#[derive(Debug)]
pub struct ActiveProgram<'a> {
    /// Index into the scheduler's registration table
    pub program_index: usize,
    /// Program type identifier, kept for queries
    pub program_type: u8,
    /// State acquired during setup, if the program needed any
    pub state: Option<StateHandle<'a>>,
}

/// Tracker lifecycle
#[derive(Debug, Default)]
pub enum Tracker<'a> {
    /// No program on this output
    #[default]
    Empty,
    /// Program is advanced every tick
    Running(ActiveProgram<'a>),
    /// Program finished; released on the next tick
    Done(ActiveProgram<'a>),
}

impl<'a> Tracker<'a> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Tracker::Empty)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Tracker::Running(_))
    }

    /// The bound program, running or done
    pub fn active(&self) -> Option<&ActiveProgram<'a>> {
        match self {
            Tracker::Empty => None,
            Tracker::Running(active) | Tracker::Done(active) => Some(active),
        }
    }

    /// Program type of the bound program
    pub fn program_type(&self) -> Option<u8> {
        self.active().map(|a| a.program_type)
    }

    /// Reset to empty
    ///
    /// Owned state is dropped here. Borrowed state is returned so the
    /// caller can give it back to its lender.
    pub fn release(&mut self) -> Option<&'a mut ProgramState> {
        match core::mem::take(self) {
            Tracker::Empty => None,
            Tracker::Running(active) | Tracker::Done(active) => match active.state {
                Some(StateHandle::Borrowed(buffer)) => Some(buffer),
                Some(StateHandle::Owned(_)) | None => None,
            },
        }
    }

    /// Move a running program to done
    pub fn mark_done(&mut self) {
        *self = match core::mem::take(self) {
            Tracker::Running(active) => Tracker::Done(active),
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(state: Option<StateHandle<'_>>) -> Tracker<'_> {
        Tracker::Running(ActiveProgram {
            program_index: 0,
            program_type: 7,
            state,
        })
    }

    #[test]
    fn test_release_owned_state() {
        let mut tracker = running(Some(StateHandle::Owned(ProgramState::Raw(Vec::new()))));
        assert_eq!(tracker.program_type(), Some(7));
        assert!(tracker.release().is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_release_returns_borrowed_state() {
        let mut buffer = ProgramState::Raw(Vec::from_slice(&[1, 2]).unwrap());
        let mut tracker = running(Some(StateHandle::Borrowed(&mut buffer)));

        let returned = tracker.release();
        assert!(tracker.is_empty());
        assert_eq!(
            returned.map(|s| s.clone()),
            Some(ProgramState::Raw(Vec::from_slice(&[1, 2]).unwrap()))
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut tracker = Tracker::Empty;
        assert!(tracker.release().is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_mark_done() {
        let mut tracker = running(None);
        tracker.mark_done();
        assert!(matches!(tracker, Tracker::Done(_)));
        assert_eq!(tracker.program_type(), Some(7));

        // Done trackers stay done
        tracker.mark_done();
        assert!(matches!(tracker, Tracker::Done(_)));
    }

    #[test]
    fn test_mark_done_keeps_borrowed_state() {
        let mut buffer = ProgramState::Raw(Vec::from_slice(&[4]).unwrap());
        let mut tracker = running(Some(StateHandle::Borrowed(&mut buffer)));
        tracker.mark_done();
        tracker.mark_done();

        let returned = tracker.release();
        assert!(returned.is_some());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_mark_done_on_empty() {
        let mut tracker = Tracker::Empty;
        tracker.mark_done();
        assert!(tracker.is_empty());
    }
}
