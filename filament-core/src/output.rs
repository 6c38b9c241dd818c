//! Physical output slots and their drivers
//!
//! An output is created once at configuration time and lives for the whole
//! process. Programs only change an output's channel values; pushing those
//! values to hardware is the job of the slot's [`OutputDriver`].

use core::convert::Infallible;

use filament_protocol::programs::{pack_color, unpack_color};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OutputType {
    Value = 1,
    Rgb = 2,
    Program = 3,
    Pixels = 4,
}

/// Output variant with its hardware parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputKind {
    /// Single PWM channel (LED, valve)
    Value { pin: u8 },
    /// Three PWM channels
    Rgb { pins: [u8; 3] },
    /// Virtual output that only hosts programs
    Program,
    /// Addressable pixel string
    Pixels {
        num_pixels: u16,
        data_pin: u8,
        clock_pin: u8,
    },
}

impl OutputKind {
    pub fn output_type(&self) -> OutputType {
        match self {
            OutputKind::Value { .. } => OutputType::Value,
            OutputKind::Rgb { .. } => OutputType::Rgb,
            OutputKind::Program => OutputType::Program,
            OutputKind::Pixels { .. } => OutputType::Pixels,
        }
    }
}

/// A configured output and its current channel values
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Output {
    /// Node-local output number
    pub number: u8,
    pub kind: OutputKind,
    values: [u8; 3],
}

impl Output {
    pub const fn new(number: u8, kind: OutputKind) -> Self {
        Self {
            number,
            kind,
            values: [0; 3],
        }
    }

    pub fn output_type(&self) -> OutputType {
        self.kind.output_type()
    }

    /// Whether color programs can drive this output
    pub fn accepts_color(&self) -> bool {
        !matches!(self.kind, OutputKind::Program)
    }

    /// Current channel values
    ///
    /// Value outputs only use the first channel.
    pub fn values(&self) -> [u8; 3] {
        self.values
    }

    /// Current channel values as a `0x00RRGGBB` color
    pub fn color(&self) -> u32 {
        unpack_color(self.values)
    }

    /// Set the channel values, returning whether anything changed
    pub fn set_values(&mut self, values: [u8; 3]) -> bool {
        let values = match self.kind {
            OutputKind::Value { .. } => [values[0], 0, 0],
            OutputKind::Program => return false,
            _ => values,
        };
        let changed = self.values != values;
        self.values = values;
        changed
    }

    /// Set a `0x00RRGGBB` color, returning whether anything changed
    pub fn set_color(&mut self, color: u32) -> bool {
        self.set_values(pack_color(color))
    }

    /// Set every channel to the same level
    pub fn set_level(&mut self, level: u8) -> bool {
        self.set_values([level; 3])
    }
}

/// Hardware driver behind an output slot
///
/// The core never inspects a driver; it only asks it to prepare the
/// hardware once and to push the output's current values.
pub trait OutputDriver {
    type Error;

    /// Prepare the hardware for `output` (pin modes, pixel buffer, ...)
    fn setup(&mut self, output: &Output) -> Result<(), Self::Error>;

    /// Push the output's current values to the hardware
    fn update(&mut self, output: &Output) -> Result<(), Self::Error>;
}

/// Outputs with nothing to drive
impl OutputDriver for () {
    type Error = Infallible;

    fn setup(&mut self, _output: &Output) -> Result<(), Self::Error> {
        Ok(())
    }

    fn update(&mut self, _output: &Output) -> Result<(), Self::Error> {
        Ok(())
    }
}
