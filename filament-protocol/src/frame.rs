//! Frame encoding and decoding for the node bus.
//!
//! Frame format:
//! - START (1 byte): 0xAA synchronization byte
//! - LENGTH (1 byte): data length (0-128)
//! - DATA (0-128 bytes): socket packet
//! - CHECKSUM (1 byte): XOR of LENGTH and all DATA bytes
//!
//! The bus is shared and half-duplex, so collisions and line noise are
//! expected. The decoder drops anything that does not check out and
//! hunts for the next START byte.

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Maximum data size in bytes
pub const MAX_FRAME_DATA: usize = 128;

/// Bytes added around the data (START + LENGTH + CHECKSUM)
pub const FRAME_OVERHEAD: usize = 3;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = MAX_FRAME_DATA + FRAME_OVERHEAD;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Data exceeds maximum allowed size
    DataTooLarge,
    /// Checksum mismatch
    InvalidChecksum,
    /// Declared length is out of range
    InvalidLength,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame contents
    pub data: Vec<u8, MAX_FRAME_DATA>,
}

impl Frame {
    /// Create a new frame around the given data
    pub fn new(data: &[u8]) -> Result<Self, FrameError> {
        let mut vec = Vec::new();
        vec.extend_from_slice(data)
            .map_err(|_| FrameError::DataTooLarge)?;
        Ok(Self { data: vec })
    }

    /// Calculate checksum for frame data
    fn calculate_checksum(length: u8, data: &[u8]) -> u8 {
        data.iter().fold(length, |acc, &byte| acc ^ byte)
    }

    /// Size of this frame once encoded
    pub fn encoded_len(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.data.len() as u8;
        let end = 2 + self.data.len();

        buffer[0] = FRAME_START;
        buffer[1] = length;
        buffer[2..end].copy_from_slice(&self.data);
        buffer[end] = Self::calculate_checksum(length, &self.data);

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_FRAME_DATA>,
    expected_length: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for START byte
    WaitingForStart,
    /// Got START, waiting for LENGTH
    WaitingForLength,
    /// Reading data bytes
    ReadingData,
    /// Waiting for CHECKSUM
    WaitingForChecksum,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForStart,
            buffer: Vec::new(),
            expected_length: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForStart;
        self.buffer.clear();
        self.expected_length = 0;
    }

    /// Whether the parser is in the middle of a frame
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForStart
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    /// After an error the parser is already hunting for the next START.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::WaitingForStart => {
                if byte == FRAME_START {
                    self.state = ParseState::WaitingForLength;
                }
                // Silently ignore non-START bytes while waiting
                Ok(None)
            }
            ParseState::WaitingForLength => {
                if byte as usize > MAX_FRAME_DATA {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.expected_length = byte;
                self.buffer.clear();
                self.state = if byte == 0 {
                    ParseState::WaitingForChecksum
                } else {
                    ParseState::ReadingData
                };
                Ok(None)
            }
            ParseState::ReadingData => {
                // Cannot overflow: expected_length <= MAX_FRAME_DATA
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_length as usize {
                    self.state = ParseState::WaitingForChecksum;
                }
                Ok(None)
            }
            ParseState::WaitingForChecksum => {
                let expected_checksum =
                    Frame::calculate_checksum(self.expected_length, &self.buffer);

                if byte != expected_checksum {
                    self.reset();
                    return Err(FrameError::InvalidChecksum);
                }

                let frame = Frame {
                    data: self.buffer.clone(),
                };

                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found along with the number of
    /// bytes consumed, so the caller can continue with the remainder.
    /// Errors are skipped over; decoding carries on with the next byte.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (usize, Option<Frame>) {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Ok(Some(frame)) = self.feed(byte) {
                return (i + 1, Some(frame));
            }
        }
        (bytes.len(), None)
    }
}
