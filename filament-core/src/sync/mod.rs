//! Clock synchronization between nodes
//!
//! A three-message handshake (SYNC, ACK, SET) lets a reactor node derive
//! the one-way bus latency and its clock offset from an initiator; RESYNC
//! later corrects drift using the latency already measured. The state
//! machine is explicit and finite and never blocks: each step is taken
//! when the next message arrives.
//!
//! ```text
//!   initiator                        reactor
//!   ─────────                        ───────
//!   synchronize() ── SYNC(t0) ──▶    anchor = t1
//!   AwaitingAck   ◀── ACK ────────   AwaitingSet
//!   Idle          ── SET(t2) ───▶    latency = (t3 - t1) / 2
//!                                    delta   = t3 - (t2 + latency)
//!                                    Synced
//! ```

pub mod machine;

pub use machine::{ClockSync, SyncState};
