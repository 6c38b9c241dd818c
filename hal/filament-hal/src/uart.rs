//! UART serial communication abstractions
//!
//! The node bus is a single-wire, half-duplex RS-485 style line. Transmit
//! blocks until the frame has left the shift register (so the direction
//! line can be released safely); receive never blocks.
//!
//! The bus runs at 28800 baud, 8 data bits, no parity, one stop bit. Chip
//! HALs configure the port before handing it to the core.

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been written or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Wait until every written byte has physically left the transmitter
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Copy already-received bytes into `buf` without waiting
    ///
    /// Returns the number of bytes copied, which is zero when nothing new
    /// has arrived.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Combined UART interface
///
/// For UARTs that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}
