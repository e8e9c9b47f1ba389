//! Serial stage loader and memory monitor.
//!
//! Target side: a chain of boot stages ([`loader::Stage`]) that bring a board
//! from reset to the [`monitor::Monitor`], which then serves memory
//! peek/poke, CRC-checked block transfers and code execution over the same
//! UART link. Host side (`std` feature): [`client::Client`] drives the
//! protocol from a serial port.
//!
//! The link is a trusted point-to-point cable. Addresses received from it
//! are dereferenced and executed without validation.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
extern crate log;

#[macro_use(block)]
extern crate nb;

extern crate embedded_hal;

#[cfg(feature = "linux")]
extern crate linux_embedded_hal;

pub mod baud;
pub mod crc32;
pub mod handoff;
pub mod loader;
pub mod memory;
pub mod monitor;
pub mod power;
pub mod protocol;
pub mod transport;

#[cfg(feature = "std")]
pub mod client;

#[cfg(feature = "linux")]
pub mod linux;

#[cfg(test)]
mod mock;

pub use crate::baud::{find_baudinfo, BaudInfo, BAUD_TABLE};
pub use crate::handoff::{Cpu, Handoff, Jump, Units};
pub use crate::loader::{LoadWindow, Stage, StageConfig, Variant};
pub use crate::memory::{Memory, RawMemory};
pub use crate::monitor::{Announce, Monitor, MonitorConfig};
pub use crate::power::Power;
pub use crate::transport::{Transport, Uart};

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error<SerialError> {
    /// Underlying UART or serial port error
    #[cfg_attr(feature = "std", error("serial error: {0:?}"))]
    Serial(SerialError),

    /// Target replied FAIL
    #[cfg_attr(feature = "std", error("target replied FAIL"))]
    Nack,

    /// Target replied with something other than OK or FAIL
    #[cfg_attr(feature = "std", error("unexpected response: {0:#04x}"))]
    InvalidResponse(u8),

    /// Wrong or missing stage/monitor signature
    #[cfg_attr(feature = "std", error("invalid signature {found:#010x}, expected {expected:#010x}"))]
    InvalidSignature { expected: u32, found: u32 },

    /// Block transfer CRC disagreed with the local checksum
    #[cfg_attr(feature = "std", error("checksum mismatch: local {local:#010x}, remote {remote:#010x}"))]
    ChecksumMismatch { local: u32, remote: u32 },

    /// No response within the configured timeout
    #[cfg_attr(feature = "std", error("response timeout"))]
    ResponseTimeout,
}

impl<SerialError> From<SerialError> for Error<SerialError> {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}
