//! Program-invocation bodies
//!
//! Each program type has a fixed body layout. Integers are little-endian.
//! Colors cross the API as `u32` values laid out `0x00RRGGBB` but travel as
//! three independent 8-bit channels, so anything above bit 23 is dropped.

use crate::messages::WireError;

/// Clears whatever program is active on the target output
pub const PROGRAM_NONE: u8 = 0x00;
pub const PROGRAM_BLINK: u8 = 0x01;
pub const PROGRAM_TIMED_CHANGE: u8 = 0x02;
pub const PROGRAM_LEVEL: u8 = 0x03;
pub const PROGRAM_FADE: u8 = 0x05;

/// Fade flag: reverse and repeat instead of stopping
pub const FADE_FLAG_CYCLE: u8 = 0x01;

/// Split a color into its wire channels
pub const fn pack_color(color: u32) -> [u8; 3] {
    [(color >> 16) as u8, (color >> 8) as u8, color as u8]
}

/// Rebuild a color from its wire channels
pub const fn unpack_color(rgb: [u8; 3]) -> u32 {
    ((rgb[0] as u32) << 16) | ((rgb[1] as u32) << 8) | rgb[2] as u32
}

fn rgb_at(body: &[u8], at: usize) -> [u8; 3] {
    [body[at], body[at + 1], body[at + 2]]
}

fn u16_at(body: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([body[at], body[at + 1]])
}

fn u32_at(body: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]])
}

/// A typed program body with a fixed wire size
pub trait ProgramBody: Sized {
    /// Program type identifier carried in the message
    const PROGRAM_TYPE: u8;
    /// Exact encoded size
    const SIZE: usize;

    /// Write the body into `buffer`, returning the bytes written
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError>;

    /// Parse a body; the length must match [`Self::SIZE`] exactly
    fn decode(body: &[u8]) -> Result<Self, WireError>;
}

/// Check encode/decode sizing for a body of `size` bytes
fn check_room(buffer: &[u8], size: usize) -> Result<(), WireError> {
    if buffer.len() < size {
        Err(WireError::BufferTooSmall)
    } else {
        Ok(())
    }
}

fn check_exact(body: &[u8], size: usize) -> Result<(), WireError> {
    if body.len() != size {
        Err(WireError::LengthMismatch)
    } else {
        Ok(())
    }
}

/// Alternate between two colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Blink {
    /// Time spent showing `on_color` (ms)
    pub on_period: u16,
    pub on_color: u32,
    /// Time spent showing `off_color` (ms)
    pub off_period: u16,
    pub off_color: u32,
}

impl ProgramBody for Blink {
    const PROGRAM_TYPE: u8 = PROGRAM_BLINK;
    const SIZE: usize = 10;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        check_room(buffer, Self::SIZE)?;
        buffer[0..2].copy_from_slice(&self.on_period.to_le_bytes());
        buffer[2..5].copy_from_slice(&pack_color(self.on_color));
        buffer[5..7].copy_from_slice(&self.off_period.to_le_bytes());
        buffer[7..10].copy_from_slice(&pack_color(self.off_color));
        Ok(Self::SIZE)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        check_exact(body, Self::SIZE)?;
        Ok(Self {
            on_period: u16_at(body, 0),
            on_color: unpack_color(rgb_at(body, 2)),
            off_period: u16_at(body, 5),
            off_color: unpack_color(rgb_at(body, 7)),
        })
    }
}

/// Show one color, then switch to another after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedChange {
    /// Delay before switching (ms)
    pub change_period: u32,
    pub start_color: u32,
    pub stop_color: u32,
}

impl ProgramBody for TimedChange {
    const PROGRAM_TYPE: u8 = PROGRAM_TIMED_CHANGE;
    const SIZE: usize = 10;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        check_room(buffer, Self::SIZE)?;
        buffer[0..4].copy_from_slice(&self.change_period.to_le_bytes());
        buffer[4..7].copy_from_slice(&pack_color(self.start_color));
        buffer[7..10].copy_from_slice(&pack_color(self.stop_color));
        Ok(Self::SIZE)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        check_exact(body, Self::SIZE)?;
        Ok(Self {
            change_period: u32_at(body, 0),
            start_color: unpack_color(rgb_at(body, 4)),
            stop_color: unpack_color(rgb_at(body, 7)),
        })
    }
}

/// Fade linearly between two colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fade {
    /// Duration of one fade (ms)
    pub period: u32,
    pub start_color: u32,
    pub stop_color: u32,
    /// Reverse and repeat forever instead of stopping
    pub cycle: bool,
}

impl ProgramBody for Fade {
    const PROGRAM_TYPE: u8 = PROGRAM_FADE;
    const SIZE: usize = 11;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        check_room(buffer, Self::SIZE)?;
        buffer[0..4].copy_from_slice(&self.period.to_le_bytes());
        buffer[4..7].copy_from_slice(&pack_color(self.start_color));
        buffer[7..10].copy_from_slice(&pack_color(self.stop_color));
        buffer[10] = if self.cycle { FADE_FLAG_CYCLE } else { 0 };
        Ok(Self::SIZE)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        check_exact(body, Self::SIZE)?;
        Ok(Self {
            period: u32_at(body, 0),
            start_color: unpack_color(rgb_at(body, 4)),
            stop_color: unpack_color(rgb_at(body, 7)),
            cycle: body[10] & FADE_FLAG_CYCLE != 0,
        })
    }
}

/// Set an output to a fixed level once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Level {
    pub value: u8,
}

impl ProgramBody for Level {
    const PROGRAM_TYPE: u8 = PROGRAM_LEVEL;
    const SIZE: usize = 1;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        check_room(buffer, Self::SIZE)?;
        buffer[0] = self.value;
        Ok(Self::SIZE)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        check_exact(body, Self::SIZE)?;
        Ok(Self { value: body[0] })
    }
}

/// Cancel the active program; carries no body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cancel;

impl ProgramBody for Cancel {
    const PROGRAM_TYPE: u8 = PROGRAM_NONE;
    const SIZE: usize = 0;

    fn encode(&self, _buffer: &mut [u8]) -> Result<usize, WireError> {
        Ok(0)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        check_exact(body, Self::SIZE)?;
        Ok(Cancel)
    }
}
