//! Error taxonomy
//!
//! Every error is handled where it occurs and reported through a return
//! value; none of them stops the transport or the scheduler.

use filament_protocol::{FrameError, WireError};

/// Malformed data: bad frames, envelopes, bodies or configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Frame failed to decode
    Frame(FrameError),
    /// Frame decoded but its contents did not parse
    Wire(WireError),
    /// Configuration blob carries the wrong magic number
    BadMagic(u16),
    /// Configuration blob has an unsupported version
    BadVersion(u8),
    /// Configuration blob could not be deserialized
    Deserialize,
    /// Configuration does not fit the caller's buffer
    Serialize,
}

/// A message named outputs that cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingError {
    /// Output index beyond the configured slots
    OutOfRange(u8),
    /// Output slot exists but holds no output
    EmptySlot(u8),
    /// Broadcast to a node with no outputs
    InvalidBroadcast,
}

/// A program could not be found or refused to install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramError {
    /// No registration for this program type
    UnknownType(u8),
    /// The body did not decode for this program type
    InvalidBody,
    /// The program cannot run on this kind of output
    UnsupportedOutput,
    /// The program's setup declined for another reason
    SetupRejected,
}

/// A fixed-capacity table is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocationError {
    /// No free output slot
    OutputsFull,
    /// No free program registration
    ProgramsFull,
}

/// Any core error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Protocol(ProtocolError),
    Addressing(AddressingError),
    Program(ProgramError),
    Allocation(AllocationError),
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AddressingError> for Error {
    fn from(e: AddressingError) -> Self {
        Error::Addressing(e)
    }
}

impl From<ProgramError> for Error {
    fn from(e: ProgramError) -> Self {
        Error::Program(e)
    }
}

impl From<AllocationError> for Error {
    fn from(e: AllocationError) -> Self {
        Error::Allocation(e)
    }
}

impl From<FrameError> for ProtocolError {
    fn from(e: FrameError) -> Self {
        ProtocolError::Frame(e)
    }
}

impl From<WireError> for ProtocolError {
    fn from(e: WireError) -> Self {
        ProtocolError::Wire(e)
    }
}
