//! Addressed message transport over the half-duplex node bus
//!
//! Only one party may drive the bus at a time. The transceiver's
//! driver-enable line is raised for the duration of a transmit and dropped
//! as soon as the last byte has left the UART, which hands the line back
//! to the other nodes.
//!
//! Reception is best-effort: malformed frames are counted and logged,
//! frames for other nodes are skipped, and the frame decoder always
//! resynchronizes on the next START byte.

use heapless::Vec;

use filament_hal::{OutputPin, Uart, UartTx};
use filament_protocol::{
    Frame, FrameError, FrameParser, SocketHeader, WireError, MAX_FRAME_DATA, MAX_MESSAGE_SIZE,
};

/// Bytes pulled from the UART per read
pub const RX_CHUNK: usize = 32;

/// Anything that can deliver a payload to a node address
///
/// Components that emit messages (clock sync, program senders) work
/// against this instead of owning the bus.
pub trait MessageSink {
    type Error;

    /// Send `payload` to the node at `address`
    fn send(&mut self, address: u16, payload: &[u8]) -> Result<(), Self::Error>;
}

impl<T: MessageSink + ?Sized> MessageSink for &mut T {
    type Error = T::Error;

    fn send(&mut self, address: u16, payload: &[u8]) -> Result<(), Self::Error> {
        (**self).send(address, payload)
    }
}

/// Transmit errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError<E> {
    /// The UART failed
    Bus(E),
    /// Payload does not fit in a single frame
    Oversize,
    /// Header could not be encoded
    Encode(WireError),
}

/// A received packet addressed to this node
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub header: SocketHeader,
    pub payload: Vec<u8, MAX_MESSAGE_SIZE>,
}

/// Bus transport
///
/// Owns the UART and the driver-enable pin. `send` must not be called
/// again before it returns; the single-threaded main loop guarantees it.
pub struct Transport<U, P> {
    uart: U,
    enable: P,
    parser: FrameParser,
    next_id: u8,
    rx: [u8; RX_CHUNK],
    rx_pos: usize,
    rx_len: usize,
    dropped: u32,
}

impl<U: Uart, P: OutputPin> Transport<U, P> {
    /// Take over the bus, leaving it in receive mode
    pub fn new(uart: U, mut enable: P) -> Self {
        enable.set_low();
        Self {
            uart,
            enable,
            parser: FrameParser::new(),
            next_id: 0,
            rx: [0; RX_CHUNK],
            rx_pos: 0,
            rx_len: 0,
            dropped: 0,
        }
    }

    /// Send `payload` to `address`, returning the message id used
    ///
    /// The enable line is released even when the UART fails.
    pub fn send(
        &mut self,
        address: u16,
        payload: &[u8],
    ) -> Result<u8, TransportError<<U as UartTx>::Error>> {
        let frame = self.build_frame(address, payload)?;
        let wire = frame
            .encode_to_vec()
            .map_err(|_| TransportError::Oversize)?;

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.enable.set_high();
        let result = self
            .uart
            .write_blocking(&wire)
            .and_then(|()| self.uart.flush());
        self.enable.set_low();

        result.map_err(TransportError::Bus)?;
        trace!("tx id {} to {=u16:#x}, {} bytes", id, address, payload.len());
        Ok(id)
    }

    fn build_frame(
        &self,
        address: u16,
        payload: &[u8],
    ) -> Result<Frame, TransportError<<U as UartTx>::Error>> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Oversize);
        }
        let header = SocketHeader {
            id: self.next_id,
            length: payload.len() as u8,
            address,
            flags: 0,
        };

        let mut packet = [0u8; MAX_FRAME_DATA];
        let head = header.encode(&mut packet).map_err(TransportError::Encode)?;
        let end = head + payload.len();
        packet[head..end].copy_from_slice(payload);

        Frame::new(&packet[..end]).map_err(|_| TransportError::Oversize)
    }

    /// Receive at most one packet for `expected` (or broadcast)
    ///
    /// Bytes left over from the previous call are decoded first; the UART
    /// is read at most once per call. Returns `None` when no complete
    /// packet for this node is available yet.
    pub fn poll(&mut self, expected: u16) -> Option<Packet> {
        let mut refilled = false;

        loop {
            if self.rx_pos == self.rx_len {
                if refilled {
                    return None;
                }
                refilled = true;
                match self.uart.read_available(&mut self.rx) {
                    Ok(0) => return None,
                    Ok(n) => {
                        self.rx_pos = 0;
                        self.rx_len = n.min(RX_CHUNK);
                    }
                    Err(_) => {
                        warn!("bus read failed");
                        return None;
                    }
                }
            }

            let byte = self.rx[self.rx_pos];
            self.rx_pos += 1;

            match self.parser.feed(byte) {
                Ok(None) => {}
                Ok(Some(frame)) => {
                    if let Some(packet) = self.accept(&frame, expected) {
                        return Some(packet);
                    }
                }
                Err(e) => self.drop_frame(e),
            }
        }
    }

    fn accept(&mut self, frame: &Frame, expected: u16) -> Option<Packet> {
        let (header, payload) = match SocketHeader::split(&frame.data) {
            Ok(split) => split,
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("dropped packet: {}", e);
                return None;
            }
        };

        if !header.is_for(expected) {
            trace!("skipping packet for {=u16:#x}", header.address);
            return None;
        }

        let payload = Vec::from_slice(payload).ok()?;
        Some(Packet { header, payload })
    }

    fn drop_frame(&mut self, error: FrameError) {
        self.dropped = self.dropped.wrapping_add(1);
        warn!("dropped frame: {}", error);
    }

    /// Frames and packets discarded as malformed so far
    pub fn dropped_frames(&self) -> u32 {
        self.dropped
    }

    /// Id the next outgoing message will carry
    pub fn next_id(&self) -> u8 {
        self.next_id
    }

    /// Give the UART and enable pin back
    pub fn release(self) -> (U, P) {
        (self.uart, self.enable)
    }
}

impl<U: Uart, P: OutputPin> MessageSink for Transport<U, P> {
    type Error = TransportError<<U as UartTx>::Error>;

    fn send(&mut self, address: u16, payload: &[u8]) -> Result<(), Self::Error> {
        Transport::send(self, address, payload).map(|_| ())
    }
}
