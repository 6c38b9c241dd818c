//! Application message envelope
//!
//! The socket payload starts with a kind byte and the sender's address,
//! followed by a kind-specific body:
//! - Program: `[output u8][program_type u8][program body]`
//! - Time sync: `[phase u8][timestamp u32 LE]`

use heapless::Vec;

use crate::programs::ProgramBody;
use crate::socket::SOCKET_HEADER_SIZE;
use crate::timesync::{TimeSyncMessage, TIMESYNC_BODY_SIZE};
use crate::frame::MAX_FRAME_DATA;

// Message kind IDs
pub const MSG_KIND_PROGRAM: u8 = 0x01;
pub const MSG_KIND_TIMESYNC: u8 = 0x02;

/// Bytes before the kind-specific body (KIND + SOURCE)
pub const ENVELOPE_HEADER_SIZE: usize = 3;

/// Program body header (OUTPUT + PROGRAM_TYPE)
pub const PROGRAM_HEADER_SIZE: usize = 2;

/// Output index meaning "every output on the node"
pub const ALL_OUTPUTS: u8 = 0xFF;

/// Largest program body any registered program may carry
pub const MAX_PROGRAM_BODY: usize = 16;

/// Largest envelope that fits in a single frame
pub const MAX_MESSAGE_SIZE: usize = MAX_FRAME_DATA - SOCKET_HEADER_SIZE;

/// Errors from formatting or parsing wire messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WireError {
    /// Caller-provided buffer cannot hold the encoding
    BufferTooSmall,
    /// Fewer bytes than a header needs
    Truncated,
    /// Declared or registered size does not match the bytes present
    LengthMismatch,
    /// Unrecognized message kind
    UnknownKind(u8),
    /// A field holds a value outside its domain
    InvalidField,
}

/// A program invocation addressed to one output (or all of them)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramMessage {
    /// Target output index, or [`ALL_OUTPUTS`]
    pub output: u8,
    /// Program type identifier
    pub program_type: u8,
    /// Raw program body, interpreted by the registered program
    pub body: Vec<u8, MAX_PROGRAM_BODY>,
}

impl ProgramMessage {
    /// Create a message from a raw body
    pub fn new(output: u8, program_type: u8, body: &[u8]) -> Result<Self, WireError> {
        let mut vec = Vec::new();
        vec.extend_from_slice(body)
            .map_err(|_| WireError::LengthMismatch)?;
        Ok(Self {
            output,
            program_type,
            body: vec,
        })
    }

    /// Create a message from a typed body
    pub fn from_body<B: ProgramBody>(output: u8, body: &B) -> Result<Self, WireError> {
        let mut buf = [0u8; MAX_PROGRAM_BODY];
        let len = body.encode(&mut buf)?;
        Self::new(output, B::PROGRAM_TYPE, &buf[..len])
    }

    /// Interpret the body as a typed program body
    pub fn decode_body<B: ProgramBody>(&self) -> Result<B, WireError> {
        B::decode(&self.body)
    }

    /// Whether this targets every output
    pub fn is_broadcast(&self) -> bool {
        self.output == ALL_OUTPUTS
    }

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        let len = PROGRAM_HEADER_SIZE + self.body.len();
        if buffer.len() < len {
            return Err(WireError::BufferTooSmall);
        }
        buffer[0] = self.output;
        buffer[1] = self.program_type;
        buffer[PROGRAM_HEADER_SIZE..len].copy_from_slice(&self.body);
        Ok(len)
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < PROGRAM_HEADER_SIZE {
            return Err(WireError::Truncated);
        }
        Self::new(body[0], body[1], &body[PROGRAM_HEADER_SIZE..])
    }
}

/// Kind-specific message content
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    Program(ProgramMessage),
    TimeSync(TimeSyncMessage),
}

impl Message {
    /// Kind byte for this message
    pub fn kind(&self) -> u8 {
        match self {
            Message::Program(_) => MSG_KIND_PROGRAM,
            Message::TimeSync(_) => MSG_KIND_TIMESYNC,
        }
    }
}

/// A message together with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Envelope {
    /// Address of the sending node
    pub source: u16,
    pub message: Message,
}

impl Envelope {
    pub fn new(source: u16, message: Message) -> Self {
        Self { source, message }
    }

    /// Encode into `buffer`, returning bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        if buffer.len() < ENVELOPE_HEADER_SIZE {
            return Err(WireError::BufferTooSmall);
        }
        buffer[0] = self.message.kind();
        buffer[1..3].copy_from_slice(&self.source.to_le_bytes());

        let body = &mut buffer[ENVELOPE_HEADER_SIZE..];
        let len = match &self.message {
            Message::Program(program) => program.encode(body)?,
            Message::TimeSync(sync) => sync.encode(body)?,
        };
        Ok(ENVELOPE_HEADER_SIZE + len)
    }

    /// Parse a socket payload
    pub fn parse(payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() < ENVELOPE_HEADER_SIZE {
            return Err(WireError::Truncated);
        }
        let source = u16::from_le_bytes([payload[1], payload[2]]);
        let body = &payload[ENVELOPE_HEADER_SIZE..];

        let message = match payload[0] {
            MSG_KIND_PROGRAM => Message::Program(ProgramMessage::decode(body)?),
            MSG_KIND_TIMESYNC => Message::TimeSync(TimeSyncMessage::decode(body)?),
            other => return Err(WireError::UnknownKind(other)),
        };

        Ok(Self { source, message })
    }
}

/// Format a complete program invocation envelope into `buffer`
///
/// Returns the bytes written, or [`WireError::BufferTooSmall`] when the
/// caller's buffer cannot hold it. Nothing is resized or retried.
pub fn format_program<B: ProgramBody>(
    buffer: &mut [u8],
    source: u16,
    output: u8,
    body: &B,
) -> Result<usize, WireError> {
    let needed = ENVELOPE_HEADER_SIZE + PROGRAM_HEADER_SIZE + B::SIZE;
    if buffer.len() < needed {
        return Err(WireError::BufferTooSmall);
    }
    let message = ProgramMessage::from_body(output, body)?;
    Envelope::new(source, Message::Program(message)).encode(buffer)
}

/// Size of an encoded time-sync envelope
pub const TIMESYNC_MESSAGE_SIZE: usize = ENVELOPE_HEADER_SIZE + TIMESYNC_BODY_SIZE;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::{Blink, Cancel, PROGRAM_BLINK, PROGRAM_NONE};
    use crate::timesync::SyncPhase;

    #[test]
    fn test_format_blink_layout() {
        let blink = Blink {
            on_period: 100,
            on_color: 0x010203,
            off_period: 200,
            off_color: 0,
        };
        let mut buf = [0u8; 32];
        let len = format_program(&mut buf, 0x0102, 3, &blink).unwrap();

        assert_eq!(len, 15);
        assert_eq!(buf[0], MSG_KIND_PROGRAM);
        assert_eq!(&buf[1..3], &[0x02, 0x01]); // source
        assert_eq!(buf[3], 3); // output
        assert_eq!(buf[4], PROGRAM_BLINK);
        assert_eq!(&buf[7..10], &[1, 2, 3]); // on color
    }

    #[test]
    fn test_format_buffer_too_small() {
        let mut buf = [0u8; 4];
        assert_eq!(
            format_program(&mut buf, 1, 0, &Cancel),
            Err(WireError::BufferTooSmall)
        );
    }

    #[test]
    fn test_cancel_has_no_body() {
        let mut buf = [0u8; 8];
        let len = format_program(&mut buf, 1, ALL_OUTPUTS, &Cancel).unwrap();
        assert_eq!(len, 5);

        let envelope = Envelope::parse(&buf[..len]).unwrap();
        match envelope.message {
            Message::Program(program) => {
                assert_eq!(program.program_type, PROGRAM_NONE);
                assert!(program.is_broadcast());
                assert!(program.body.is_empty());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_timesync_envelope() {
        let envelope = Envelope::new(
            0x0A0B,
            Message::TimeSync(TimeSyncMessage::new(SyncPhase::Ack, 1234)),
        );
        let mut buf = [0u8; TIMESYNC_MESSAGE_SIZE];
        assert_eq!(envelope.encode(&mut buf), Ok(TIMESYNC_MESSAGE_SIZE));
        assert_eq!(Envelope::parse(&buf), Ok(envelope));
    }

    #[test]
    fn test_parse_unknown_kind() {
        assert_eq!(
            Envelope::parse(&[0x7E, 0, 0]),
            Err(WireError::UnknownKind(0x7E))
        );
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(Envelope::parse(&[MSG_KIND_PROGRAM]), Err(WireError::Truncated));
        assert_eq!(
            Envelope::parse(&[MSG_KIND_PROGRAM, 0, 0, 1]),
            Err(WireError::Truncated)
        );
    }

    #[test]
    fn test_decode_typed_body() {
        let blink = Blink {
            on_period: 1,
            on_color: 0xFFFFFF,
            off_period: 2,
            off_color: 0,
        };
        let msg = ProgramMessage::from_body(0, &blink).unwrap();
        assert_eq!(msg.decode_body::<Blink>(), Ok(blink));
    }
}
