//! Clock sync state machine

use filament_protocol::messages::TIMESYNC_MESSAGE_SIZE;
use filament_protocol::{Envelope, Message, SyncPhase, TimeSyncMessage};

use crate::transport::MessageSink;

/// Handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncState {
    /// No handshake in flight
    #[default]
    Idle,
    /// Initiator sent SYNC
    AwaitingAck,
    /// Reactor sent ACK
    AwaitingSet,
    /// Reactor has a delta and latency
    Synced,
}

/// Per-node clock sync state
///
/// Only one handshake is tracked at a time, whichever peer it is with.
/// Times passed in are the node's raw monotonic clock; timestamps sent out
/// are the adjusted clock.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockSync {
    /// This node's address, used as the envelope source
    address: u16,
    state: SyncState,
    latency: u32,
    /// Offset added to the raw clock, wrapping
    delta: u32,
    /// Raw time the in-flight SYNC arrived
    anchor_ms: u32,
}

impl ClockSync {
    pub const fn new(address: u16) -> Self {
        Self {
            address,
            state: SyncState::Idle,
            latency: 0,
            delta: 0,
            anchor_ms: 0,
        }
    }

    /// Synchronized time for a raw clock reading
    pub fn adjusted_ms(&self, raw_ms: u32) -> u32 {
        raw_ms.wrapping_add(self.delta)
    }

    /// Synchronized time in whole seconds
    pub fn adjusted_s(&self, raw_ms: u32) -> u32 {
        self.adjusted_ms(raw_ms) / 1000
    }

    /// Start a handshake with `target`
    ///
    /// A handshake already in flight is abandoned. Returns whether a
    /// handshake is in flight afterwards (always true), so the caller can
    /// poll the bus more often until it completes.
    pub fn synchronize<S: MessageSink>(&mut self, sink: &mut S, target: u16, raw_ms: u32) -> bool {
        if self.in_flight() {
            debug!("sync: abandoning {} handshake", self.state);
        }
        debug!("sync: SYNC to {=u16:#x}", target);
        self.send(sink, target, SyncPhase::Sync, raw_ms);
        self.state = SyncState::AwaitingAck;
        self.in_flight()
    }

    /// Feed a received time-sync message from `source`
    ///
    /// Messages that do not fit the current phase are ignored. Returns
    /// whether a handshake is in flight afterwards.
    pub fn handle<S: MessageSink>(
        &mut self,
        sink: &mut S,
        source: u16,
        msg: &TimeSyncMessage,
        raw_ms: u32,
    ) -> bool {
        match (self.state, msg.phase) {
            (SyncState::Idle | SyncState::Synced, SyncPhase::Sync) => {
                debug!("sync: SYNC from {=u16:#x}", source);
                self.anchor_ms = raw_ms;
                self.send(sink, source, SyncPhase::Ack, raw_ms);
                self.state = SyncState::AwaitingSet;
            }
            (SyncState::AwaitingAck, SyncPhase::Ack) => {
                debug!("sync: ACK from {=u16:#x}", source);
                self.send(sink, source, SyncPhase::Set, raw_ms);
                self.state = SyncState::Idle;
            }
            (SyncState::AwaitingSet, SyncPhase::Set) => {
                self.latency = raw_ms.wrapping_sub(self.anchor_ms) / 2;
                self.delta = self.offset_from(msg.timestamp, raw_ms);
                self.state = SyncState::Synced;
                info!(
                    "sync: synced to {=u16:#x}, latency {} delta {}",
                    source,
                    self.latency,
                    self.delta()
                );
            }
            (SyncState::Synced, SyncPhase::Resync) => {
                self.delta = self.offset_from(msg.timestamp, raw_ms);
                debug!("sync: RESYNC from {=u16:#x}, delta {}", source, self.delta());
            }
            (state, phase) => {
                trace!("sync: ignoring {} in {}", phase, state);
            }
        }
        self.in_flight()
    }

    /// Send a drift correction to `target`; the phase does not change
    pub fn resynchronize<S: MessageSink>(&mut self, sink: &mut S, target: u16, raw_ms: u32) {
        self.send(sink, target, SyncPhase::Resync, raw_ms);
    }

    fn offset_from(&self, timestamp: u32, raw_ms: u32) -> u32 {
        raw_ms.wrapping_sub(timestamp.wrapping_add(self.latency))
    }

    fn send<S: MessageSink>(&self, sink: &mut S, target: u16, phase: SyncPhase, raw_ms: u32) {
        let msg = TimeSyncMessage::new(phase, self.adjusted_ms(raw_ms));
        let envelope = Envelope::new(self.address, Message::TimeSync(msg));

        let mut buf = [0u8; TIMESYNC_MESSAGE_SIZE];
        let Ok(len) = envelope.encode(&mut buf) else {
            error!("sync: encode failed");
            return;
        };
        if sink.send(target, &buf[..len]).is_err() {
            warn!("sync: send of {} to {=u16:#x} failed", phase, target);
        }
    }

    /// Whether a handshake is waiting on the peer
    pub fn in_flight(&self) -> bool {
        matches!(self.state, SyncState::AwaitingAck | SyncState::AwaitingSet)
    }

    pub fn phase(&self) -> SyncState {
        self.state
    }

    /// Estimated one-way bus latency (ms)
    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Clock offset (ms)
    pub fn delta(&self) -> i32 {
        self.delta as i32
    }
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;

    /// Records sent messages
    #[derive(Default)]
    struct Outbox {
        sent: Vec<(u16, Envelope), 8>,
        fail: bool,
    }

    impl MessageSink for Outbox {
        type Error = ();

        fn send(&mut self, address: u16, payload: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            let envelope = Envelope::parse(payload).map_err(|_| ())?;
            self.sent.push((address, envelope)).map_err(|_| ())
        }
    }

    impl Outbox {
        /// Last message sent, as (target, source, time-sync message)
        fn last(&self) -> (u16, u16, TimeSyncMessage) {
            let (target, envelope) = self.sent.last().unwrap();
            match envelope.message {
                Message::TimeSync(msg) => (*target, envelope.source, msg),
                ref other => panic!("unexpected message {:?}", other),
            }
        }
    }

    const INITIATOR: u16 = 0x0001;
    const REACTOR: u16 = 0x0002;

    /// Run a full handshake at t0..t3, returning both sides
    fn handshake(t0: u32, t1: u32, t2: u32, t3: u32) -> (ClockSync, ClockSync) {
        let mut initiator = ClockSync::new(INITIATOR);
        let mut reactor = ClockSync::new(REACTOR);
        let mut bus = Outbox::default();

        assert!(initiator.synchronize(&mut bus, REACTOR, t0));
        let (target, source, sync) = bus.last();
        assert_eq!((target, source, sync.phase), (REACTOR, INITIATOR, SyncPhase::Sync));

        assert!(reactor.handle(&mut bus, source, &sync, t1));
        let (target, source, ack) = bus.last();
        assert_eq!((target, source, ack.phase), (INITIATOR, REACTOR, SyncPhase::Ack));

        assert!(!initiator.handle(&mut bus, source, &ack, t2));
        let (_, source, set) = bus.last();
        assert_eq!(set.phase, SyncPhase::Set);
        assert_eq!(set.timestamp, t2);

        assert!(!reactor.handle(&mut bus, source, &set, t3));
        (initiator, reactor)
    }

    #[test]
    fn test_handshake_formula() {
        let (initiator, reactor) = handshake(100, 5000, 110, 5020);

        assert_eq!(reactor.phase(), SyncState::Synced);
        assert_eq!(reactor.latency(), 10);
        assert_eq!(reactor.delta(), 5020 - (110 + 10));
        assert_eq!(reactor.adjusted_ms(6000), 6000 + 4900);
        assert_eq!(reactor.adjusted_s(6000), 10);

        // The initiator never reaches Synced
        assert_eq!(initiator.phase(), SyncState::Idle);
        assert_eq!(initiator.delta(), 0);
    }

    #[test]
    fn test_handshake_negative_delta() {
        let (_, reactor) = handshake(9000, 200, 9010, 220);
        assert_eq!(reactor.delta(), 220 - (9010 + 10));
        assert_eq!(reactor.adjusted_ms(10_000), 10_000 - 8800);
    }

    #[test]
    fn test_resync_when_synced() {
        let (mut initiator, mut reactor) = handshake(100, 5000, 110, 5020);
        let mut bus = Outbox::default();

        initiator.resynchronize(&mut bus, REACTOR, 700);
        let (_, source, resync) = bus.last();
        assert_eq!(resync.phase, SyncPhase::Resync);
        assert_eq!(initiator.phase(), SyncState::Idle);

        assert!(!reactor.handle(&mut bus, source, &resync, 5700));
        assert_eq!(reactor.delta(), 5700 - (700 + 10));
        assert_eq!(reactor.phase(), SyncState::Synced);
    }

    #[test]
    fn test_resync_ignored_unless_synced() {
        let mut bus = Outbox::default();
        let resync = TimeSyncMessage::new(SyncPhase::Resync, 1234);

        let mut idle = ClockSync::new(REACTOR);
        assert!(!idle.handle(&mut bus, INITIATOR, &resync, 9999));
        assert_eq!(idle.phase(), SyncState::Idle);
        assert_eq!(idle.delta(), 0);

        let mut waiting = ClockSync::new(REACTOR);
        let sync = TimeSyncMessage::new(SyncPhase::Sync, 0);
        waiting.handle(&mut bus, INITIATOR, &sync, 10);
        assert!(waiting.handle(&mut bus, INITIATOR, &resync, 9999));
        assert_eq!(waiting.phase(), SyncState::AwaitingSet);
        assert_eq!(waiting.delta(), 0);

        let mut initiator = ClockSync::new(INITIATOR);
        initiator.synchronize(&mut bus, REACTOR, 0);
        assert!(initiator.handle(&mut bus, REACTOR, &resync, 9999));
        assert_eq!(initiator.phase(), SyncState::AwaitingAck);
        assert_eq!(initiator.delta(), 0);
    }

    #[test]
    fn test_out_of_phase_messages_ignored() {
        let mut bus = Outbox::default();
        let mut sync = ClockSync::new(REACTOR);

        let set = TimeSyncMessage::new(SyncPhase::Set, 50);
        assert!(!sync.handle(&mut bus, INITIATOR, &set, 100));
        let ack = TimeSyncMessage::new(SyncPhase::Ack, 50);
        assert!(!sync.handle(&mut bus, INITIATOR, &ack, 100));

        assert_eq!(sync.phase(), SyncState::Idle);
        assert!(bus.sent.is_empty());
    }

    #[test]
    fn test_synced_node_accepts_new_handshake() {
        let (_, mut reactor) = handshake(100, 5000, 110, 5020);
        let mut bus = Outbox::default();

        let sync = TimeSyncMessage::new(SyncPhase::Sync, 0);
        assert!(reactor.handle(&mut bus, INITIATOR, &sync, 6000));
        assert_eq!(reactor.phase(), SyncState::AwaitingSet);
        // Timestamps go out on the adjusted clock
        assert_eq!(bus.last().2.timestamp, 6000 + 4900);
    }

    #[test]
    fn test_send_failure_still_advances() {
        let mut bus = Outbox {
            fail: true,
            ..Outbox::default()
        };
        let mut sync = ClockSync::new(INITIATOR);
        assert!(sync.synchronize(&mut bus, REACTOR, 0));
        assert_eq!(sync.phase(), SyncState::AwaitingAck);
    }
}
