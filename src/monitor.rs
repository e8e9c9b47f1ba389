//! Memory monitor command loop
//!
//! Entered once the last boot stage has handed over. Serves memory
//! peek/poke, checksummed block transfers and rate changes until the host
//! hands control to loaded code.

use core::convert::TryFrom;

use crate::crc32::crc32;
use crate::handoff::{Cpu, Handoff, Jump};
use crate::loader::set_baudrate;
use crate::memory::Memory;
use crate::protocol::{MonitorCommand, MODULE_CORE, MONITOR_SIGNATURE};
use crate::transport::{Transport, Uart};
use crate::Error;

/// What the monitor sends when it starts
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Announce {
    /// A fixed signature word
    Signature(u32),
    /// CRC-32 of the monitor's own resident image
    ImageCrc { start: u32, len: u32 },
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MonitorConfig {
    /// Expect a module selector byte ahead of each command
    pub module_select: bool,
    pub announce: Announce,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            module_select: true,
            announce: Announce::Signature(MONITOR_SIGNATURE),
        }
    }
}

pub struct Monitor<U, M, C, E> {
    transport: Transport<U, E>,
    memory: M,
    handoff: Handoff<C>,
    config: MonitorConfig,
}

impl<U, M, C, E> Monitor<U, M, C, E>
where
    U: Uart<E>,
    M: Memory,
    C: Cpu,
    E: core::fmt::Debug,
{
    pub fn new(transport: Transport<U, E>, memory: M, handoff: Handoff<C>, config: MonitorConfig) -> Self {
        Self { transport, memory, handoff, config }
    }

    /// Tell the host the monitor is up
    pub fn announce(&mut self) -> Result<(), Error<E>> {
        let word = match self.config.announce {
            Announce::Signature(s) => s,
            Announce::ImageCrc { start, len } => (0..len)
                .map(|i| self.memory.read_u8(start.wrapping_add(i)))
                .fold(0, crc32),
        };

        debug!("Monitor announced ({:08x})", word);

        self.transport.write_u32(word)
    }

    /// Receive and serve a single command.
    ///
    /// Returns the requested jump for `run` and `run-kernel`, the caller
    /// performs it.
    pub fn service(&mut self) -> Result<Option<Jump>, Error<E>> {
        if self.config.module_select {
            let module = self.transport.read_u8()?;
            if module != MODULE_CORE {
                trace!("Skipping module {:#04x}", module);
                return Ok(None);
            }
        }

        let command = match MonitorCommand::try_from(self.transport.read_u8()?) {
            Ok(c) => c,
            Err(e) => {
                trace!("Ignoring command {:#04x}", e.0);
                return Ok(None);
            }
        };

        trace!("Command {:?}", command);

        let t = &mut self.transport;
        let m = &mut self.memory;

        match command {
            MonitorCommand::Nop => (),
            MonitorCommand::SetBaudrate => {
                let rate = t.read_u32()?;
                set_baudrate(t, rate)?;
            }
            MonitorCommand::WriteU8 => {
                let addr = t.read_u32()?;
                m.write_u8(addr, t.read_u8()?);
            }
            MonitorCommand::WriteU16 => {
                let addr = t.read_u32()?;
                m.write_u16(addr, t.read_u16()?);
            }
            MonitorCommand::WriteU32 => {
                let addr = t.read_u32()?;
                m.write_u32(addr, t.read_u32()?);
            }
            MonitorCommand::ReadU8 => {
                let addr = t.read_u32()?;
                t.write_u8(m.read_u8(addr))?;
            }
            MonitorCommand::ReadU16 => {
                let addr = t.read_u32()?;
                t.write_u16(m.read_u16(addr))?;
            }
            MonitorCommand::ReadU32 => {
                let addr = t.read_u32()?;
                t.write_u32(m.read_u32(addr))?;
            }
            MonitorCommand::MemWrite => self.mem_write()?,
            MonitorCommand::MemRead => self.mem_read()?,
            MonitorCommand::Run => {
                let entry = t.read_u32()?;
                return Ok(Some(Jump::Plain { entry }));
            }
            MonitorCommand::RunKernel => {
                let entry = t.read_u32()?;
                let machine = t.read_u32()?;
                return Ok(Some(Jump::Kernel { entry, machine }));
            }
        }

        Ok(None)
    }

    /// Stream `size` bytes from the link to memory, reply with their CRC.
    ///
    /// A receive error still uses up its byte of the block, so the stream
    /// stays aligned. The error is returned after the CRC, which no longer
    /// matches the host's.
    fn mem_write(&mut self) -> Result<(), Error<E>> {
        let addr = self.transport.read_u32()?;
        let size = self.transport.read_u32()?;

        let mut crc = 0;
        let mut fault = None;
        for i in 0..size {
            match self.transport.read_u8() {
                Ok(b) => {
                    self.memory.write_u8(addr.wrapping_add(i), b);
                    crc = crc32(crc, b);
                }
                Err(e) => {
                    warn!("Receive error at byte {} of {}: {:?}", i, size, e);
                    if fault.is_none() {
                        fault = Some(e);
                    }
                }
            }
        }

        debug!("Wrote {} bytes at {:08x}, crc {:08x}", size, addr, crc);

        self.transport.write_u32(crc)?;

        match fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream `size` bytes from memory to the link, followed by their CRC
    fn mem_read(&mut self) -> Result<(), Error<E>> {
        let addr = self.transport.read_u32()?;
        let size = self.transport.read_u32()?;

        let mut crc = 0;
        for i in 0..size {
            let b = self.memory.read_u8(addr.wrapping_add(i));
            self.transport.write_u8(b)?;
            crc = crc32(crc, b);
        }

        debug!("Read {} bytes at {:08x}, crc {:08x}", size, addr, crc);

        self.transport.write_u32(crc)
    }

    /// Announce and serve commands until the host hands off. Does not return.
    pub fn run(mut self) -> ! {
        if let Err(e) = self.announce() {
            warn!("Announce failed: {:?}", e);
        }

        loop {
            match self.service() {
                Ok(Some(jump)) => self.handoff.execute(jump),
                Ok(None) => (),
                Err(e) => warn!("Monitor error: {:?}", e),
            }
        }
    }

    pub fn transport(&self) -> &Transport<U, E> {
        &self.transport
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}
