//! Program execution scheduler
//!
//! Holds the output arena (one slot per output, each with its driver and
//! tracker), installs programs from incoming messages and advances every
//! running program once per tick.

use heapless::Vec;

use filament_protocol::programs::PROGRAM_NONE;
use filament_protocol::ProgramMessage;

use super::registration::{Install, Registration, TickContext};
use super::tracker::{ActiveProgram, ProgramState, StateHandle, Tracker};
use crate::config::NodeConfig;
use crate::error::{AddressingError, AllocationError, Error, ProgramError};
use crate::output::{Output, OutputDriver, OutputKind, OutputType};
use crate::programs::{builtin, BUILTIN_COUNT};

/// Maximum output slots per node
pub const MAX_OUTPUTS: usize = 8;

/// Maximum program registrations
pub const MAX_PROGRAMS: usize = 16;

const _: () = assert!(BUILTIN_COUNT <= MAX_PROGRAMS);

/// Outcome of dispatching one program message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchReport {
    /// Outputs the message was applied to
    pub applied: u8,
    /// Outputs whose setup failed
    pub failed: u8,
    /// Some output's values changed during install
    pub changed: bool,
    /// First setup failure, if any
    pub first_error: Option<ProgramError>,
}

impl DispatchReport {
    fn fail(&mut self, error: ProgramError) {
        self.failed += 1;
        self.first_error.get_or_insert(error);
    }

    /// Every resolved output accepted the message
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// One output with everything bound to it
struct Slot<'a, D> {
    output: Output,
    driver: D,
    tracker: Tracker<'a>,
    /// Caller-owned state buffer waiting to be adopted by the next install
    loan: Option<&'a mut ProgramState>,
}

impl<'a, D> Slot<'a, D> {
    /// Tear down the tracker, handing a borrowed buffer back to the loan
    fn release(&mut self) {
        if let Some(buffer) = self.tracker.release() {
            self.loan = Some(buffer);
        }
    }
}

/// Per-output program scheduler
///
/// `'a` is the lifetime of caller-owned state buffers lent with
/// [`Scheduler::lend_state`]; `D` is the output driver type.
pub struct Scheduler<'a, D> {
    slots: Vec<Option<Slot<'a, D>>, MAX_OUTPUTS>,
    programs: Vec<Registration<D>, MAX_PROGRAMS>,
}

impl<'a, D> Default for Scheduler<'a, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, D> Scheduler<'a, D> {
    /// Scheduler with no outputs and no programs
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            programs: Vec::new(),
        }
    }

    /// Scheduler with the built-in programs registered
    pub fn with_builtin_programs() -> Self {
        let mut scheduler = Self::new();
        for registration in builtin() {
            let _ = scheduler.register(registration);
        }
        scheduler
    }

    /// Add a program registration
    ///
    /// A registration for an already known type replaces the old one.
    /// Type 0 is the cancel sentinel; a registration for it is never run.
    pub fn register(&mut self, registration: Registration<D>) -> Result<(), AllocationError> {
        if let Some(index) = self.lookup_program(registration.program_type) {
            self.programs[index] = registration;
            return Ok(());
        }
        self.programs
            .push(registration)
            .map_err(|_| AllocationError::ProgramsFull)
    }

    /// Append an output slot, returning its output number
    pub fn add_output(&mut self, kind: OutputKind, driver: D) -> Result<u8, AllocationError> {
        let output = Output::new(self.slots.len() as u8, kind);
        self.push_slot(output, driver)
    }

    /// Append a slot with no output behind it
    pub fn add_empty_slot(&mut self) -> Result<u8, AllocationError> {
        let number = self.slots.len() as u8;
        self.slots
            .push(None)
            .map_err(|_| AllocationError::OutputsFull)?;
        Ok(number)
    }

    /// Build the output arena from a node configuration
    ///
    /// `make_driver` is called once per configured output, in order.
    pub fn from_config(
        config: &NodeConfig,
        mut make_driver: impl FnMut(&Output) -> D,
    ) -> Result<Self, AllocationError> {
        let mut scheduler = Self::with_builtin_programs();
        for entry in config.outputs.iter() {
            let Some(entry) = entry else {
                scheduler.add_empty_slot()?;
                continue;
            };
            let mut output = Output::new(scheduler.slots.len() as u8, entry.kind);
            output.set_values(entry.values);
            let driver = make_driver(&output);
            scheduler.push_slot(output, driver)?;
        }
        Ok(scheduler)
    }

    fn push_slot(&mut self, output: Output, driver: D) -> Result<u8, AllocationError> {
        let number = output.number;
        let slot = Slot {
            output,
            driver,
            tracker: Tracker::Empty,
            loan: None,
        };
        self.slots
            .push(Some(slot))
            .map_err(|_| AllocationError::OutputsFull)?;
        Ok(number)
    }

    /// Lend a caller-owned state buffer to an output
    ///
    /// The next program installed on the output adopts the buffer instead
    /// of owning fresh state. The scheduler never drops it; it returns to
    /// the slot when the program is released. Any buffer already waiting on
    /// the slot is handed back.
    pub fn lend_state(
        &mut self,
        index: u8,
        buffer: &'a mut ProgramState,
    ) -> Result<Option<&'a mut ProgramState>, AddressingError> {
        let slot = self.slot_mut(index)?;
        Ok(slot.loan.replace(buffer))
    }

    /// Take back a lent buffer that no program is using
    pub fn reclaim_state(&mut self, index: u8) -> Option<&'a mut ProgramState> {
        self.slot_mut(index).ok()?.loan.take()
    }

    /// Install (or cancel) a program on the outputs a message names
    ///
    /// Unknown program types and unresolvable outputs fail the whole
    /// message before anything is touched. Past that point each output is
    /// handled independently: a setup failure on one output is counted in
    /// the report and never stops the others.
    pub fn handle_message(
        &mut self,
        msg: &ProgramMessage,
        now_ms: u32,
    ) -> Result<DispatchReport, Error> {
        let program_index = if msg.program_type == PROGRAM_NONE {
            None
        } else {
            let index = self
                .lookup_program(msg.program_type)
                .ok_or(ProgramError::UnknownType(msg.program_type))?;
            Some(index)
        };

        let (first, last) = self.resolve(msg.output)?;
        let mut report = DispatchReport::default();

        for index in first..=last {
            let Some(slot) = self.slots[index].as_mut() else {
                continue;
            };

            let Some(program_index) = program_index else {
                if !slot.tracker.is_empty() {
                    debug!("output {}: cancelled", index);
                }
                slot.release();
                report.applied += 1;
                continue;
            };

            let registration = self.programs[program_index];
            let before = slot.output.values();

            let Some(setup) = registration.setup else {
                // Fire-and-forget: run once against the output, keep nothing
                let mut ctx = TickContext {
                    now_ms,
                    output: Some(&mut slot.output),
                    driver: Some(&mut slot.driver),
                    state: None,
                    input: &msg.body,
                };
                let step = (registration.tick)(&mut ctx);
                report.changed |= step.changed;
                match step.error {
                    Some(e) => {
                        report.fail(e);
                        warn!("output {}: program {} failed: {}", index, registration.program_type, e);
                    }
                    None => report.applied += 1,
                }
                continue;
            };

            slot.release();

            let mut state = None;
            let result = {
                let Slot {
                    output,
                    driver,
                    loan,
                    ..
                } = &mut *slot;
                let mut install = Install {
                    output,
                    driver,
                    now_ms,
                    state: &mut state,
                    loan,
                };
                setup(msg, &mut install)
            };

            match result {
                Ok(()) => {
                    slot.tracker = Tracker::Running(ActiveProgram {
                        program_index,
                        program_type: registration.program_type,
                        state,
                    });
                    report.applied += 1;
                    report.changed |= slot.output.values() != before;
                    debug!("output {}: installed program {}", index, registration.program_type);
                }
                Err(e) => {
                    if let Some(StateHandle::Borrowed(buffer)) = state {
                        slot.loan = Some(buffer);
                    }
                    report.fail(e);
                    warn!("output {}: setup failed: {}", index, e);
                }
            }
        }

        Ok(report)
    }

    /// Advance every running program once
    ///
    /// Trackers that finished on an earlier tick are released first.
    /// Returns whether any output changed.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        let mut changed = false;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot.as_mut() else {
                continue;
            };

            let Tracker::Running(active) = &mut slot.tracker else {
                if matches!(slot.tracker, Tracker::Done(_)) {
                    trace!("output {}: released", index);
                    slot.release();
                }
                continue;
            };

            let tick = self.programs[active.program_index].tick;
            let mut ctx = TickContext {
                now_ms,
                output: Some(&mut slot.output),
                driver: Some(&mut slot.driver),
                state: active.state.as_mut().map(StateHandle::get_mut),
                input: &[],
            };
            let step = tick(&mut ctx);

            changed |= step.changed;
            if let Some(e) = step.error {
                warn!("output {}: program failed: {}", index, e);
            }
            if step.done {
                slot.tracker.mark_done();
            }
        }

        changed
    }

    /// Run a program's tick with no output binding
    ///
    /// For handlers fed from outside the animation lifecycle (sensor data,
    /// host commands). Returns the step's changed flag, or the error the
    /// program reported.
    pub fn run_external(
        &mut self,
        program_type: u8,
        input: &[u8],
        now_ms: u32,
    ) -> Result<bool, ProgramError> {
        let index = self
            .lookup_program(program_type)
            .ok_or(ProgramError::UnknownType(program_type))?;
        let mut ctx = TickContext::external(now_ms, input);
        let step = (self.programs[index].tick)(&mut ctx);
        match step.error {
            Some(e) => Err(e),
            None => Ok(step.changed),
        }
    }

    /// Program type bound to an output, if any
    pub fn program_on(&self, index: u8) -> Option<u8> {
        self.slot(index).ok()?.tracker.program_type()
    }

    /// Number of outputs with a running program
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.tracker.is_running())
            .count()
    }

    /// Tracker of an output
    pub fn tracker(&self, index: u8) -> Option<&Tracker<'a>> {
        self.slot(index).ok().map(|slot| &slot.tracker)
    }

    /// Configured output
    pub fn output(&self, index: u8) -> Option<&Output> {
        self.slot(index).ok().map(|slot| &slot.output)
    }

    /// Number of slots, including empty ones
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Output number of the `nth` output of type `output_type`
    pub fn lookup_output_by_type(&self, output_type: OutputType, nth: usize) -> Option<u8> {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.output.output_type() == output_type)
            .nth(nth)
            .map(|slot| slot.output.number)
    }

    /// Registration table index for a program type
    pub fn lookup_program(&self, program_type: u8) -> Option<usize> {
        self.programs
            .iter()
            .position(|r| r.program_type == program_type)
    }

    /// Inclusive slot range a message's output field names
    fn resolve(&self, output: u8) -> Result<(usize, usize), AddressingError> {
        if output == filament_protocol::ALL_OUTPUTS {
            if self.slots.iter().all(Option::is_none) {
                return Err(AddressingError::InvalidBroadcast);
            }
            return Ok((0, self.slots.len() - 1));
        }
        self.slot(output)?;
        Ok((output as usize, output as usize))
    }

    fn slot(&self, index: u8) -> Result<&Slot<'a, D>, AddressingError> {
        self.slots
            .get(index as usize)
            .ok_or(AddressingError::OutOfRange(index))?
            .as_ref()
            .ok_or(AddressingError::EmptySlot(index))
    }

    fn slot_mut(&mut self, index: u8) -> Result<&mut Slot<'a, D>, AddressingError> {
        self.slots
            .get_mut(index as usize)
            .ok_or(AddressingError::OutOfRange(index))?
            .as_mut()
            .ok_or(AddressingError::EmptySlot(index))
    }
}

impl<'a, D: OutputDriver> Scheduler<'a, D> {
    /// Prepare every output's hardware, returning the number of failures
    pub fn setup_outputs(&mut self) -> usize {
        let mut failures = 0;
        for slot in self.slots.iter_mut().flatten() {
            if slot.driver.setup(&slot.output).is_err() {
                error!("output {}: driver setup failed", slot.output.number);
                failures += 1;
            }
        }
        failures
    }

    /// Push every output's values to its driver, returning the number of
    /// failures
    pub fn update_outputs(&mut self) -> usize {
        let mut failures = 0;
        for slot in self.slots.iter_mut().flatten() {
            if slot.driver.update(&slot.output).is_err() {
                warn!("output {}: driver update failed", slot.output.number);
                failures += 1;
            }
        }
        failures
    }
}
