
use core::convert::TryFrom;

/// Announced by a stage loader once its link is up
pub const STAGE_SIGNATURE: u32 = 0x6E6F_4DE6;

/// Announced by the monitor on entry ("uMON")
pub const MONITOR_SIGNATURE: u32 = 0x4E4F_4D75;

pub const REPLY_OK: u8 = 0x01;
pub const REPLY_FAIL: u8 = 0x00;

/// Sent by the host at the new rate to complete a baud change
pub const SYNC: [u8; 2] = [0x55, 0xAA];

/// Module selector addressing the monitor core
pub const MODULE_CORE: u8 = 0x00;

/// Boot parameter pointer passed to kernels, meaning "no parameter block"
pub const NO_PARAMS: u32 = 0xFFFF_FFFF;

/// Returned when a command byte does not name a known command
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct UnknownCommand(pub u8);

/// Commands accepted by a stage loader
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LoaderCommand {
    /// Do nothing
    Nop = 0x00,

    /// Leave the loader and enter the next stage
    GoMain = 0x01,

    /// Change the link rate, followed by a u32 baud rate
    SetBaudrate = 0x02,

    /// Load the rest of the next stage, followed by a u32 size and the image words
    LoadRest = 0x03,
}

impl TryFrom<u8> for LoaderCommand {
    type Error = UnknownCommand;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Nop),
            0x01 => Ok(Self::GoMain),
            0x02 => Ok(Self::SetBaudrate),
            0x03 => Ok(Self::LoadRest),
            v => Err(UnknownCommand(v)),
        }
    }
}

/// Commands accepted by the monitor
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MonitorCommand {
    /// Do nothing
    Nop = 0x00,

    /// Change the link rate, followed by a u32 baud rate
    SetBaudrate = 0x01,

    /// Store a byte: u32 address, u8 value
    WriteU8 = 0x02,

    /// Store a halfword: u32 address, u16 value
    WriteU16 = 0x03,

    /// Store a word: u32 address, u32 value
    WriteU32 = 0x04,

    /// Load a byte from a u32 address
    ReadU8 = 0x05,

    /// Load a halfword from a u32 address
    ReadU16 = 0x06,

    /// Load a word from a u32 address
    ReadU32 = 0x07,

    /// Write a block: u32 address, u32 size, payload. Replies with the CRC-32.
    MemWrite = 0x08,

    /// Read a block: u32 address, u32 size. Replies with payload then CRC-32.
    MemRead = 0x09,

    /// Call a u32 address with no arguments
    Run = 0x0A,

    /// Boot a kernel: u32 address, u32 machine type
    RunKernel = 0x0B,
}

impl TryFrom<u8> for MonitorCommand {
    type Error = UnknownCommand;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let c = match value {
            0x00 => Self::Nop,
            0x01 => Self::SetBaudrate,
            0x02 => Self::WriteU8,
            0x03 => Self::WriteU16,
            0x04 => Self::WriteU32,
            0x05 => Self::ReadU8,
            0x06 => Self::ReadU16,
            0x07 => Self::ReadU32,
            0x08 => Self::MemWrite,
            0x09 => Self::MemRead,
            0x0A => Self::Run,
            0x0B => Self::RunKernel,
            v => return Err(UnknownCommand(v)),
        };
        Ok(c)
    }
}
