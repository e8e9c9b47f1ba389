//! Boot stage loader
//!
//! Each stage powers the board, brings the link up at the default rate,
//! announces itself, then takes a rate change and the next stage's image
//! before handing over. The [`Variant::Loader`] form dispatches commands
//! from the host, [`Variant::Startup`] runs the same steps as a fixed
//! sequence.

use core::convert::TryFrom;

use crate::handoff::idle;
use crate::memory::Memory;
use crate::power::Power;
use crate::protocol::{LoaderCommand, REPLY_FAIL, REPLY_OK, STAGE_SIGNATURE, SYNC};
use crate::transport::{Transport, Uart};
use crate::Error;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Variant {
    /// Command driven: nop, go-main, set-baudrate, load-rest
    Loader,
    /// Fixed sequence: set-baudrate then load-rest
    Startup,
}

/// Memory window receiving the next stage
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct LoadWindow {
    /// First address past this stage's resident footprint
    pub start: u32,
    /// End of loadable memory (exclusive)
    pub end: u32,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct StageConfig {
    pub variant: Variant,
    pub signature: u32,
    pub window: LoadWindow,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Loader,
            signature: STAGE_SIGNATURE,
            window: LoadWindow { start: 0x0000_0200, end: 0x0000_4000 },
        }
    }
}

/// Outcome of a single loader command
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Flow {
    Continue,
    Exit,
}

/// Change the link rate without losing synchronisation.
///
/// Replies FAIL and keeps the current rate if `rate` is unsupported.
/// Otherwise replies OK at the old rate, switches, discards input until the
/// host's sync pair arrives at the new rate and replies OK again.
/// Returns whether the rate was changed.
pub fn set_baudrate<U, E>(transport: &mut Transport<U, E>, rate: u32) -> Result<bool, Error<E>>
where
    U: Uart<E>,
{
    let baud = match transport.find_baudinfo(rate) {
        Some(b) => b,
        None => {
            debug!("Unsupported baud rate {}", rate);
            transport.write_u8(REPLY_FAIL)?;
            return Ok(false);
        }
    };

    transport.write_u8(REPLY_OK)?;
    transport.init(Some(&baud))?;

    // Anything before the sync pair is noise from the rate switch
    let mut last = None;
    loop {
        let b = transport.read_u8()?;
        if last == Some(SYNC[0]) && b == SYNC[1] {
            break;
        }
        last = Some(b);
    }

    transport.write_u8(REPLY_OK)?;

    debug!("Link resynchronised at {} baud", rate);

    Ok(true)
}

/// One boot stage, generic over its UART, memory and power drivers
pub struct Stage<U, M, P, E> {
    transport: Transport<U, E>,
    memory: M,
    power: P,
    config: StageConfig,
}

impl<U, M, P, E> Stage<U, M, P, E>
where
    U: Uart<E>,
    M: Memory,
    P: Power,
    E: core::fmt::Debug,
{
    pub fn new(transport: Transport<U, E>, memory: M, power: P, config: StageConfig) -> Self {
        Self { transport, memory, power, config }
    }

    /// Latch power, bring the link up at the default rate and announce
    pub fn start(&mut self) -> Result<(), Error<E>> {
        self.power.power_on();
        self.transport.init(None)?;
        self.transport.write_u32(self.config.signature)?;

        debug!("Stage announced ({:08x})", self.config.signature);

        Ok(())
    }

    /// Receive and execute a single loader command
    pub fn step(&mut self) -> Result<Flow, Error<E>> {
        let command = self.transport.read_u8()?;

        match LoaderCommand::try_from(command) {
            Ok(LoaderCommand::Nop) => (),
            Ok(LoaderCommand::GoMain) => return Ok(Flow::Exit),
            Ok(LoaderCommand::SetBaudrate) => {
                let rate = self.transport.read_u32()?;
                set_baudrate(&mut self.transport, rate)?;
            }
            Ok(LoaderCommand::LoadRest) => self.load_rest()?,
            Err(e) => trace!("Ignoring command {:#04x}", e.0),
        }

        Ok(Flow::Continue)
    }

    /// Run the stage up to the point of handing over to the next one
    pub fn run(&mut self) -> Result<(), Error<E>> {
        self.start()?;
        self.sequence()
    }

    /// Command loop (or fixed sequence) following the announce
    pub fn sequence(&mut self) -> Result<(), Error<E>> {
        match self.config.variant {
            Variant::Loader => while self.step()? == Flow::Continue {},
            Variant::Startup => {
                let rate = self.transport.read_u32()?;
                set_baudrate(&mut self.transport, rate)?;
                self.load_rest()?;
            }
        }

        Ok(())
    }

    /// Receive the next stage into the load window.
    ///
    /// The image arrives as a u32 byte count followed by whole words. Words
    /// that would land outside the window are read and dropped.
    ///
    /// A receive error uses up its byte of the image and the word holding
    /// it is not stored. The whole image is still consumed, then FAIL is
    /// sent and the error returned.
    pub fn load_rest(&mut self) -> Result<(), Error<E>> {
        let size = self.transport.read_u32()?;
        let LoadWindow { start, end } = self.config.window;

        let mut dropped = 0u32;
        let mut fault = None;
        let mut offset = 0u64;

        while offset < size as u64 {
            let mut bytes = [0u8; 4];
            let mut intact = true;

            for b in bytes.iter_mut() {
                match self.transport.read_u8() {
                    Ok(v) => *b = v,
                    Err(e) => {
                        warn!("Receive error at image offset {}: {:?}", offset, e);
                        intact = false;
                        if fault.is_none() {
                            fault = Some(e);
                        }
                    }
                }
            }

            let addr = start as u64 + offset;

            if addr + 4 > end as u64 {
                dropped += 1;
            } else if intact {
                self.memory.write_u32(addr as u32, u32::from_le_bytes(bytes));
            }

            offset += 4;
        }

        if dropped > 0 {
            warn!("Image overran load window by {} words", dropped);
        }

        if let Some(e) = fault {
            self.transport.write_u8(REPLY_FAIL)?;
            return Err(e);
        }

        self.transport.write_u8(REPLY_OK)?;

        debug!("Loaded {} bytes at {:08x}", size, start);

        Ok(())
    }

    /// Enter the next stage with this stage's link and memory.
    ///
    /// Only returns if `next` does.
    pub fn enter_next<F>(self, next: F)
    where
        F: FnOnce(Transport<U, E>, M),
    {
        next(self.transport, self.memory)
    }

    /// Run the stage then hand over to `next`. Does not return.
    ///
    /// Link errors restart the command sequence, power and announce are
    /// not repeated.
    pub fn boot<F>(mut self, next: F) -> !
    where
        F: FnOnce(Transport<U, E>, M),
    {
        if let Err(e) = self.start() {
            warn!("Stage start failed: {:?}", e);
        }

        while let Err(e) = self.sequence() {
            warn!("Stage error: {:?}", e);
        }

        self.enter_next(next);

        idle()
    }

    pub fn transport(&self) -> &Transport<U, E> {
        &self.transport
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn power(&self) -> &P {
        &self.power
    }
}
