//! Addressed socket header
//!
//! Every frame on the bus carries one socket packet: a fixed header naming
//! the destination node followed by the payload. The header `length` only
//! covers the payload; the frame's own length covers header and payload.

use crate::messages::WireError;

/// Size of the encoded socket header
pub const SOCKET_HEADER_SIZE: usize = 5;

/// Destination address accepted by every node
pub const BROADCAST_ADDRESS: u16 = 0xFFFF;

/// Socket packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketHeader {
    /// Sender-local message counter, wraps at 255
    pub id: u8,
    /// Payload length in bytes
    pub length: u8,
    /// Destination node address
    pub address: u16,
    /// Reserved, always zero on transmit
    pub flags: u8,
}

impl SocketHeader {
    /// Whether this packet is for `address` (directly or by broadcast)
    pub fn is_for(&self, address: u16) -> bool {
        self.address == address || self.address == BROADCAST_ADDRESS
    }

    /// Encode the header into the front of `buffer`
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, WireError> {
        if buffer.len() < SOCKET_HEADER_SIZE {
            return Err(WireError::BufferTooSmall);
        }
        let address = self.address.to_le_bytes();
        buffer[0] = self.id;
        buffer[1] = self.length;
        buffer[2] = address[0];
        buffer[3] = address[1];
        buffer[4] = self.flags;
        Ok(SOCKET_HEADER_SIZE)
    }

    /// Split a received packet into its header and payload
    ///
    /// Checks that the packet holds a complete header and at least as many
    /// payload bytes as the header declares. Trailing bytes past the
    /// declared payload are ignored.
    pub fn split(packet: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if packet.len() < SOCKET_HEADER_SIZE {
            return Err(WireError::Truncated);
        }
        let header = Self {
            id: packet[0],
            length: packet[1],
            address: u16::from_le_bytes([packet[2], packet[3]]),
            flags: packet[4],
        };
        let end = SOCKET_HEADER_SIZE + header.length as usize;
        if packet.len() < end {
            return Err(WireError::LengthMismatch);
        }
        Ok((header, &packet[SOCKET_HEADER_SIZE..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = SocketHeader {
            id: 7,
            length: 2,
            address: 0x1234,
            flags: 0,
        };
        let mut buf = [0u8; 8];
        assert_eq!(header.encode(&mut buf), Ok(SOCKET_HEADER_SIZE));
        assert_eq!(&buf[..5], &[7, 2, 0x34, 0x12, 0]);
    }

    #[test]
    fn test_split_packet() {
        let packet = [1, 2, 0x34, 0x12, 0, 0xAB, 0xCD, 0xEF];
        let (header, payload) = SocketHeader::split(&packet).unwrap();
        assert_eq!(header.id, 1);
        assert_eq!(header.address, 0x1234);
        assert_eq!(payload, &[0xAB, 0xCD]);
    }

    #[test]
    fn test_split_short_header() {
        assert_eq!(SocketHeader::split(&[1, 2, 3]), Err(WireError::Truncated));
    }

    #[test]
    fn test_split_short_payload() {
        let packet = [1, 4, 0x34, 0x12, 0, 0xAB];
        assert_eq!(SocketHeader::split(&packet), Err(WireError::LengthMismatch));
    }

    #[test]
    fn test_broadcast_matches_everyone() {
        let header = SocketHeader {
            id: 0,
            length: 0,
            address: BROADCAST_ADDRESS,
            flags: 0,
        };
        assert!(header.is_for(1));
        assert!(header.is_for(0x0200));
    }
}
