//! Blocking byte transport over the target UART

use core::marker::PhantomData;

use embedded_hal::serial::{Read, Write};

use crate::baud::{find_baudinfo, BaudInfo, BAUD_TABLE};
use crate::Error;

/// UART driver used by the target side of the link
pub trait Uart<E>: Write<u8, Error = E> + Read<u8, Error = E> {
    /// Reprogram the clock generator and baud divisor.
    ///
    /// Callers flush before reconfiguring, any byte still in flight is lost.
    fn configure(&mut self, baud: &BaudInfo) -> Result<(), E>;
}

/// Owns the UART and its current configuration.
///
/// Multi-byte values are sent and received least significant byte first.
pub struct Transport<U, E> {
    uart: U,
    table: &'static [BaudInfo],
    current: Option<BaudInfo>,
    _err: PhantomData<E>,
}

impl<U, E> Transport<U, E>
where
    U: Uart<E>,
{
    /// Create a transport using the default baud table
    pub fn new(uart: U) -> Self {
        Self::with_table(uart, &BAUD_TABLE)
    }

    /// Create a transport with a board specific baud table.
    ///
    /// The first entry is the default rate.
    pub fn with_table(uart: U, table: &'static [BaudInfo]) -> Self {
        Self {
            uart,
            table,
            current: None,
            _err: PhantomData,
        }
    }

    /// (Re)initialise the UART, `None` selects the default rate
    pub fn init(&mut self, baud: Option<&BaudInfo>) -> Result<(), Error<E>> {
        let baud = match baud.or_else(|| self.table.first()) {
            Some(b) => *b,
            None => return Ok(()),
        };

        // Wait for the transmitter to drain
        block!(self.uart.flush())?;

        self.uart.configure(&baud)?;
        self.current = Some(baud);

        debug!("UART configured for {} baud", baud.rate);

        Ok(())
    }

    /// Look up a supported rate
    pub fn find_baudinfo(&self, rate: u32) -> Option<BaudInfo> {
        find_baudinfo(self.table, rate).copied()
    }

    /// Currently configured rate, if initialised
    pub fn baud(&self) -> Option<u32> {
        self.current.map(|b| b.rate)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error<E>> {
        let v = block!(self.uart.read())?;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error<E>> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | hi << 8)
    }

    pub fn read_u32(&mut self) -> Result<u32, Error<E>> {
        let lo = self.read_u16()? as u32;
        let hi = self.read_u16()? as u32;
        Ok(lo | hi << 16)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), Error<E>> {
        block!(self.uart.write(v))?;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), Error<E>> {
        self.write_u8(v as u8)?;
        self.write_u8((v >> 8) as u8)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), Error<E>> {
        self.write_u16(v as u16)?;
        self.write_u16((v >> 16) as u16)
    }

    /// Block until all written bytes have left the UART
    pub fn flush(&mut self) -> Result<(), Error<E>> {
        block!(self.uart.flush())?;
        Ok(())
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Release the underlying UART
    pub fn free(self) -> U {
        self.uart
    }
}
