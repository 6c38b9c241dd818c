//! Node main-loop glue
//!
//! A [`Node`] owns the bus transport, the program scheduler, the clock sync
//! state and the raw clock. The firmware main loop calls [`Node::poll`] as
//! often as it can (more often while [`ClockSync::in_flight`]) and
//! [`Node::tick`] at its animation rate.

use filament_hal::{Clock, OutputPin, Uart, UartTx};
use filament_protocol::{format_program, Envelope, Message, ProgramBody, MAX_MESSAGE_SIZE};

use crate::config::NodeConfig;
use crate::error::{Error, ProtocolError};
use crate::output::{Output, OutputDriver};
use crate::scheduler::{DispatchReport, Scheduler};
use crate::sync::ClockSync;
use crate::transport::{Transport, TransportError};

/// What a call to [`Node::poll`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeEvent {
    /// A program message was dispatched to the scheduler
    Program(Result<DispatchReport, Error>),
    /// A time-sync message was handled
    TimeSync {
        /// A handshake is still waiting on the peer
        in_flight: bool,
    },
    /// A packet for this node carried an unparseable envelope
    Malformed(ProtocolError),
}

/// A complete bus node
pub struct Node<'a, U, P, C, D> {
    address: u16,
    transport: Transport<U, P>,
    scheduler: Scheduler<'a, D>,
    sync: ClockSync,
    clock: C,
}

impl<'a, U, P, C, D> Node<'a, U, P, C, D>
where
    U: Uart,
    P: OutputPin,
    C: Clock,
    D: OutputDriver,
{
    pub fn new(address: u16, transport: Transport<U, P>, scheduler: Scheduler<'a, D>, clock: C) -> Self {
        Self {
            address,
            transport,
            scheduler,
            sync: ClockSync::new(address),
            clock,
        }
    }

    /// Build a node from its configuration
    ///
    /// Validates the configuration, creates one driver per configured
    /// output and runs every driver's setup. Driver setup failures are
    /// logged, not fatal.
    pub fn from_config(
        config: &NodeConfig,
        uart: U,
        enable: P,
        clock: C,
        make_driver: impl FnMut(&Output) -> D,
    ) -> Result<Self, Error> {
        config.validate()?;
        let mut scheduler = Scheduler::from_config(config, make_driver)?;
        let failures = scheduler.setup_outputs();
        if failures > 0 {
            warn!("{} output(s) failed setup", failures);
        }
        info!(
            "node {=u16:#x}: {} output(s) configured",
            config.address,
            config.output_count()
        );
        Ok(Self::new(config.address, Transport::new(uart, enable), scheduler, clock))
    }

    /// Receive and route at most one message
    ///
    /// Program messages go to the scheduler on the synchronized clock and
    /// outputs are pushed to their drivers if anything changed. Time-sync
    /// messages go to the clock sync state machine.
    pub fn poll(&mut self) -> Option<NodeEvent> {
        let packet = self.transport.poll(self.address)?;

        let envelope = match Envelope::parse(&packet.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("malformed message: {}", e);
                return Some(NodeEvent::Malformed(e.into()));
            }
        };

        let raw_ms = self.clock.now_ms();
        let event = match envelope.message {
            Message::Program(msg) => {
                let result = self
                    .scheduler
                    .handle_message(&msg, self.sync.adjusted_ms(raw_ms));
                match &result {
                    Ok(report) if report.changed => {
                        self.scheduler.update_outputs();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("program from {=u16:#x} rejected: {}", envelope.source, e),
                }
                NodeEvent::Program(result)
            }
            Message::TimeSync(msg) => {
                let in_flight = self
                    .sync
                    .handle(&mut self.transport, envelope.source, &msg, raw_ms);
                NodeEvent::TimeSync { in_flight }
            }
        };
        Some(event)
    }

    /// Advance every program on the synchronized clock
    ///
    /// Returns whether any output changed; changed outputs have already
    /// been pushed to their drivers.
    pub fn tick(&mut self) -> bool {
        let changed = self.scheduler.tick(self.now_ms());
        if changed {
            self.scheduler.update_outputs();
        }
        changed
    }

    /// Synchronized time
    pub fn now_ms(&self) -> u32 {
        self.sync.adjusted_ms(self.clock.now_ms())
    }

    /// Start a clock handshake with `target`
    pub fn synchronize(&mut self, target: u16) -> bool {
        let raw_ms = self.clock.now_ms();
        self.sync.synchronize(&mut self.transport, target, raw_ms)
    }

    /// Send a drift correction to `target`
    pub fn resynchronize(&mut self, target: u16) {
        let raw_ms = self.clock.now_ms();
        self.sync.resynchronize(&mut self.transport, target, raw_ms);
    }

    /// Send a program invocation to `output` on the node at `address`
    pub fn send_program<B: ProgramBody>(
        &mut self,
        address: u16,
        output: u8,
        body: &B,
    ) -> Result<u8, TransportError<<U as UartTx>::Error>> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let len = format_program(&mut buf, self.address, output, body)
            .map_err(TransportError::Encode)?;
        self.transport.send(address, &buf[..len])
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn scheduler(&self) -> &Scheduler<'a, D> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<'a, D> {
        &mut self.scheduler
    }

    pub fn sync(&self) -> &ClockSync {
        &self.sync
    }

    pub fn transport(&self) -> &Transport<U, P> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<U, P> {
        &mut self.transport
    }
}
