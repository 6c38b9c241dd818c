//! Clock synchronization messages
//!
//! Body layout: `[phase u8][timestamp u32 LE]`. The timestamp is always the
//! sender's clock at the moment of sending.

use crate::messages::WireError;

/// Size of an encoded time-sync body
pub const TIMESYNC_BODY_SIZE: usize = 5;

/// Step of the synchronization exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SyncPhase {
    /// Initiator starts a handshake
    Sync = 0,
    /// Reactor acknowledges and starts timing
    Ack = 1,
    /// Initiator's reference timestamp
    Set = 2,
    /// Drift correction using the established latency
    Resync = 3,
}

impl SyncPhase {
    /// Decode a phase byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Sync),
            1 => Some(Self::Ack),
            2 => Some(Self::Set),
            3 => Some(Self::Resync),
            _ => None,
        }
    }
}

/// A single time-sync message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSyncMessage {
    pub phase: SyncPhase,
    /// Sender clock in milliseconds
    pub timestamp: u32,
}

impl TimeSyncMessage {
    pub const fn new(phase: SyncPhase, timestamp: u32) -> Self {
        Self { phase, timestamp }
    }

    /// Encode into `buffer`, returning bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        if buffer.len() < TIMESYNC_BODY_SIZE {
            return Err(WireError::BufferTooSmall);
        }
        buffer[0] = self.phase as u8;
        buffer[1..5].copy_from_slice(&self.timestamp.to_le_bytes());
        Ok(TIMESYNC_BODY_SIZE)
    }

    /// Parse a body; the length must match exactly
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() != TIMESYNC_BODY_SIZE {
            return Err(WireError::LengthMismatch);
        }
        let phase = SyncPhase::from_byte(body[0]).ok_or(WireError::InvalidField)?;
        Ok(Self {
            phase,
            timestamp: u32::from_le_bytes([body[1], body[2], body[3], body[4]]),
        })
    }
}
