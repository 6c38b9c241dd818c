//! Configuration type definitions

use heapless::Vec;

use crate::error::ProtocolError;
use crate::output::OutputKind;
use crate::scheduler::MAX_OUTPUTS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Magic number at the start of every configuration blob ("FL")
pub const CONFIG_MAGIC: u16 = 0x464C;

/// Current configuration layout version
pub const CONFIG_VERSION: u8 = 1;

/// One configured output slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputConfig {
    pub kind: OutputKind,
    /// Channel values applied at startup
    pub values: [u8; 3],
}

impl OutputConfig {
    pub const fn new(kind: OutputKind) -> Self {
        Self {
            kind,
            values: [0; 3],
        }
    }
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeConfig {
    /// Must be [`CONFIG_MAGIC`]
    pub magic: u16,
    /// Must be [`CONFIG_VERSION`]
    pub version: u8,
    /// This node's bus address
    pub address: u16,
    /// Output descriptors indexed by output number; `None` leaves a gap
    pub outputs: Vec<Option<OutputConfig>, MAX_OUTPUTS>,
}

impl NodeConfig {
    /// Empty configuration for `address`
    pub fn new(address: u16) -> Self {
        Self {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            address,
            outputs: Vec::new(),
        }
    }

    /// Check the header fields
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.magic != CONFIG_MAGIC {
            return Err(ProtocolError::BadMagic(self.magic));
        }
        if self.version != CONFIG_VERSION {
            return Err(ProtocolError::BadVersion(self.version));
        }
        Ok(())
    }

    /// Number of configured (non-gap) outputs
    pub fn output_count(&self) -> usize {
        self.outputs.iter().flatten().count()
    }

    /// Deserialize and validate a postcard blob
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ProtocolError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize into `buffer`, returning the used part
    #[cfg(feature = "serde")]
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], ProtocolError> {
        postcard::to_slice(self, buffer).map_err(|_| ProtocolError::Serialize)
    }
}
