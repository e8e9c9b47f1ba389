//! Host side driver for the stage loader and monitor protocol

use core::marker::PhantomData;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};

use crate::crc32::{self, checksum};
use crate::protocol::{
    LoaderCommand, MonitorCommand, MODULE_CORE, MONITOR_SIGNATURE, REPLY_FAIL, REPLY_OK,
    STAGE_SIGNATURE, SYNC,
};
use crate::Error;

/// Host serial port
pub trait SerialPort<E>: Write<u8, Error = E> + Read<u8, Error = E> {
    fn set_rts(&mut self, level: bool) -> Result<(), E>;
    fn set_dtr(&mut self, level: bool) -> Result<(), E>;
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), E>;
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    Init,
    /// Talking to a stage loader
    Loader,
    /// Talking to a fixed sequence startup stage, which takes no opcodes
    Startup,
    /// Talking to the monitor
    Monitor,
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "structopt", derive(structopt::StructOpt))]
pub struct Options {
    /// Do not reset the device on connection
    #[cfg_attr(feature = "structopt", structopt(long))]
    pub no_reset: bool,

    /// Timeout to wait for target responses
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "1000"))]
    pub response_timeout_ms: u32,

    /// Period to poll for target responses
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "1"))]
    pub poll_delay_ms: u32,

    /// Period to wait after reset before expecting the stage signature
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "500"))]
    pub reset_delay_ms: u32,

    /// Monitor does not expect a module selector before each command
    #[cfg_attr(feature = "structopt", structopt(long))]
    pub no_module_select: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            no_reset: false,
            response_timeout_ms: 1000,
            poll_delay_ms: 1,
            reset_delay_ms: 500,
            no_module_select: false,
        }
    }
}

pub struct Client<P, D, E> {
    state: State,
    options: Options,
    port: P,
    delay: D,
    _err: PhantomData<E>,
}

impl<P, D, E> Client<P, D, E>
where
    P: SerialPort<E>,
    D: DelayMs<u32>,
    E: core::fmt::Debug,
{
    /// Create a new client instance
    pub fn new(port: P, delay: D, options: Options) -> Self {
        Self {
            state: State::Init,
            options,
            port,
            delay,
            _err: PhantomData,
        }
    }

    /// Fetch the client state
    pub fn state(&self) -> State {
        self.state
    }

    /// Reset the target through DTR/RTS
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        if self.options.no_reset {
            return Ok(());
        }

        debug!("Resetting device");

        self.port.set_dtr(true)?;
        self.port.set_rts(true)?;

        self.delay.delay_ms(100u32);

        self.port.set_dtr(false)?;
        self.port.set_rts(false)?;

        self.delay.delay_ms(self.options.reset_delay_ms);

        Ok(())
    }

    /// Wait for a stage loader to announce itself
    pub fn connect(&mut self) -> Result<(), Error<E>> {
        debug!("Awaiting stage signature");
        self.await_signature(STAGE_SIGNATURE)?;
        self.state = State::Loader;
        Ok(())
    }

    /// Wait for a fixed sequence startup stage to announce itself
    pub fn connect_startup(&mut self) -> Result<(), Error<E>> {
        debug!("Awaiting startup stage signature");
        self.await_signature(STAGE_SIGNATURE)?;
        self.state = State::Startup;
        Ok(())
    }

    /// Wait for the monitor to announce itself
    pub fn await_monitor(&mut self) -> Result<(), Error<E>> {
        debug!("Awaiting monitor signature");
        self.await_signature(MONITOR_SIGNATURE)?;
        self.state = State::Monitor;
        Ok(())
    }

    /// Assume the monitor is already running
    pub fn attach(&mut self) {
        self.state = State::Monitor;
    }

    /// Full boot: reset, negotiate `rate`, load `image` and enter the monitor
    pub fn boot(&mut self, image: &[u8], rate: u32) -> Result<(), Error<E>> {
        self.reset()?;
        self.connect()?;
        self.set_baudrate(rate)?;
        self.load_rest(image)?;
        self.go_main()?;
        self.await_monitor()
    }

    /// Drive a startup stage: reset, negotiate `rate` and load `image`.
    ///
    /// The startup stage enters the loaded image by itself, the client is
    /// left in `State::Init` ready to connect to whatever it announces.
    pub fn startup(&mut self, image: &[u8], rate: u32) -> Result<(), Error<E>> {
        self.reset()?;
        self.connect_startup()?;
        self.set_baudrate(rate)?;
        self.load_rest(image)?;
        self.state = State::Init;
        Ok(())
    }

    /// Change the link rate on both ends
    pub fn set_baudrate(&mut self, rate: u32) -> Result<(), Error<E>> {
        debug!("Setting target baud rate to {}", rate);

        match self.state {
            State::Monitor => self.send_command(MonitorCommand::SetBaudrate as u8)?,
            State::Startup => (),
            State::Init | State::Loader => self.send(LoaderCommand::SetBaudrate as u8)?,
        }
        self.send_word(rate)?;

        // Sent at the old rate, before the target switches
        self.await_ok()?;

        self.port.set_baud_rate(rate)?;

        for b in SYNC.iter() {
            self.send(*b)?;
        }

        self.await_ok()?;

        info!("Link running at {} baud", rate);

        Ok(())
    }

    /// Send the rest of the next stage to a stage loader or startup stage
    pub fn load_rest(&mut self, image: &[u8]) -> Result<(), Error<E>> {
        debug!("Loading {} byte image", image.len());

        if self.state != State::Startup {
            self.send(LoaderCommand::LoadRest as u8)?;
        }
        self.send_word(image.len() as u32)?;

        for b in image {
            self.send(*b)?;
        }

        // The loader consumes whole words
        for _ in 0..(4 - image.len() % 4) % 4 {
            self.send(0)?;
        }

        self.await_ok()
    }

    /// Tell the stage loader to enter the next stage
    pub fn go_main(&mut self) -> Result<(), Error<E>> {
        self.send(LoaderCommand::GoMain as u8)
    }

    pub fn read_u8(&mut self, addr: u32) -> Result<u8, Error<E>> {
        self.send_command(MonitorCommand::ReadU8 as u8)?;
        self.send_word(addr)?;
        self.read_byte()
    }

    pub fn read_u16(&mut self, addr: u32) -> Result<u16, Error<E>> {
        self.send_command(MonitorCommand::ReadU16 as u8)?;
        self.send_word(addr)?;
        self.read_half()
    }

    pub fn read_u32(&mut self, addr: u32) -> Result<u32, Error<E>> {
        self.send_command(MonitorCommand::ReadU32 as u8)?;
        self.send_word(addr)?;
        self.read_word()
    }

    pub fn write_u8(&mut self, addr: u32, v: u8) -> Result<(), Error<E>> {
        self.send_command(MonitorCommand::WriteU8 as u8)?;
        self.send_word(addr)?;
        self.send(v)
    }

    pub fn write_u16(&mut self, addr: u32, v: u16) -> Result<(), Error<E>> {
        self.send_command(MonitorCommand::WriteU16 as u8)?;
        self.send_word(addr)?;
        self.send(v as u8)?;
        self.send((v >> 8) as u8)
    }

    pub fn write_u32(&mut self, addr: u32, v: u32) -> Result<(), Error<E>> {
        self.send_command(MonitorCommand::WriteU32 as u8)?;
        self.send_word(addr)?;
        self.send_word(v)
    }

    /// Write a block of target memory, `progress` is called with the bytes sent so far
    pub fn mem_write<F>(&mut self, addr: u32, data: &[u8], mut progress: F) -> Result<(), Error<E>>
    where
        F: FnMut(usize),
    {
        self.send_command(MonitorCommand::MemWrite as u8)?;
        self.send_word(addr)?;
        self.send_word(data.len() as u32)?;

        for (i, b) in data.iter().enumerate() {
            self.send(*b)?;
            progress(i + 1);
        }

        let remote = self.read_word()?;
        let local = checksum(data);
        if remote != local {
            error!("Block write checksum mismatch");
            return Err(Error::ChecksumMismatch { local, remote });
        }

        Ok(())
    }

    /// Read a block of target memory into `data`
    pub fn mem_read<F>(&mut self, addr: u32, data: &mut [u8], mut progress: F) -> Result<(), Error<E>>
    where
        F: FnMut(usize),
    {
        self.send_command(MonitorCommand::MemRead as u8)?;
        self.send_word(addr)?;
        self.send_word(data.len() as u32)?;

        let mut local = 0;
        for (i, b) in data.iter_mut().enumerate() {
            *b = self.read_byte()?;
            local = crc32::crc32(local, *b);
            progress(i + 1);
        }

        let remote = self.read_word()?;
        if remote != local {
            error!("Block read checksum mismatch");
            return Err(Error::ChecksumMismatch { local, remote });
        }

        Ok(())
    }

    /// Call code at `addr`, the monitor does not come back
    pub fn run(&mut self, addr: u32) -> Result<(), Error<E>> {
        self.send_command(MonitorCommand::Run as u8)?;
        self.send_word(addr)
    }

    /// Boot a kernel at `addr` with the given machine type
    pub fn run_kernel(&mut self, addr: u32, machine: u32) -> Result<(), Error<E>> {
        self.send_command(MonitorCommand::RunKernel as u8)?;
        self.send_word(addr)?;
        self.send_word(machine)
    }

    /// Release the underlying port, for use as a terminal after a handoff
    pub fn free(self) -> P {
        self.port
    }

    fn send_command(&mut self, command: u8) -> Result<(), Error<E>> {
        if !self.options.no_module_select {
            self.send(MODULE_CORE)?;
        }
        self.send(command)
    }

    fn send(&mut self, v: u8) -> Result<(), Error<E>> {
        block!(self.port.write(v))?;
        Ok(())
    }

    fn send_word(&mut self, v: u32) -> Result<(), Error<E>> {
        for b in v.to_le_bytes().iter() {
            self.send(*b)?;
        }
        Ok(())
    }

    fn await_signature(&mut self, expected: u32) -> Result<(), Error<E>> {
        let found = self.read_word()?;
        if found != expected {
            error!("Unexpected signature: 0x{:08x}", found);
            return Err(Error::InvalidSignature { expected, found });
        }
        Ok(())
    }

    fn await_ok(&mut self) -> Result<(), Error<E>> {
        match self.read_byte()? {
            REPLY_OK => Ok(()),
            REPLY_FAIL => {
                debug!("Received FAIL");
                Err(Error::Nack)
            }
            v => {
                debug!("Received unexpected value: 0x{:x}", v);
                Err(Error::InvalidResponse(v))
            }
        }
    }

    fn read_half(&mut self) -> Result<u16, Error<E>> {
        let lo = self.read_byte()? as u16;
        let hi = self.read_byte()? as u16;
        Ok(lo | hi << 8)
    }

    fn read_word(&mut self) -> Result<u32, Error<E>> {
        let lo = self.read_half()? as u32;
        let hi = self.read_half()? as u32;
        Ok(lo | hi << 16)
    }

    fn read_byte(&mut self) -> Result<u8, Error<E>> {
        let mut t = 0;

        loop {
            // Attempt to read from serial port
            match self.port.read() {
                Err(nb::Error::WouldBlock) => (),
                Err(nb::Error::Other(e)) => return Err(e.into()),
                Ok(v) => return Ok(v),
            };

            // Wait for delay period
            self.delay.delay_ms(self.options.poll_delay_ms);
            t += self.options.poll_delay_ms;

            if t > self.options.response_timeout_ms {
                error!("Receive timeout");
                return Err(Error::ResponseTimeout);
            }
        }
    }
}
