//! Test doubles for the target side drivers

use std::collections::{BTreeMap, VecDeque};

use embedded_hal::serial::{Read, Write};

use crate::baud::BaudInfo;
use crate::handoff::Cpu;
use crate::power::Power;
use crate::transport::Uart;
use crate::memory::Memory;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum MockError {
    /// Scripted input ran out
    Exhausted,
    /// Injected receive error
    Overrun,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Event {
    Rx(u8),
    Tx(u8),
    RxError(MockError),
    Configure(u32),
}

/// UART fed from a script, recording everything that happens on the line
#[derive(Debug, Default)]
pub struct MockUart {
    rx: VecDeque<Result<u8, MockError>>,
    events: Vec<Event>,
}

impl MockUart {
    pub fn new(rx: &[u8]) -> Self {
        Self {
            rx: rx.iter().map(|b| Ok(*b)).collect(),
            events: Vec::new(),
        }
    }

    /// Report `e` instead of a byte once `index` scripted bytes have been read
    pub fn fault_at(&mut self, index: usize, e: MockError) {
        self.rx.insert(index, Err(e));
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Bytes transmitted so far
    pub fn sent(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Tx(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// Scripted bytes not yet consumed
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Read<u8> for MockUart {
    type Error = MockError;

    fn read(&mut self) -> nb::Result<u8, MockError> {
        match self.rx.pop_front() {
            Some(Ok(b)) => {
                self.events.push(Event::Rx(b));
                Ok(b)
            }
            Some(Err(e)) => {
                self.events.push(Event::RxError(e));
                Err(nb::Error::Other(e))
            }
            None => Err(nb::Error::Other(MockError::Exhausted)),
        }
    }
}

impl Write<u8> for MockUart {
    type Error = MockError;

    fn write(&mut self, word: u8) -> nb::Result<(), MockError> {
        self.events.push(Event::Tx(word));
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), MockError> {
        Ok(())
    }
}

impl Uart<MockError> for MockUart {
    fn configure(&mut self, baud: &BaudInfo) -> Result<(), MockError> {
        self.events.push(Event::Configure(baud.rate));
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Access {
    Write8(u32, u8),
    Write16(u32, u16),
    Write32(u32, u32),
}

/// Sparse little-endian memory, unwritten bytes read as zero
#[derive(Debug, Default)]
pub struct MockMemory {
    bytes: BTreeMap<u32, u8>,
    accesses: Vec<Access>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, addr: u32, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.bytes.insert(addr.wrapping_add(i as u32), *b);
        }
    }

    pub fn slice(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| *self.bytes.get(&addr.wrapping_add(i as u32)).unwrap_or(&0))
            .collect()
    }

    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    fn get(&self, addr: u32, len: u32) -> u32 {
        (0..len).rev().fold(0, |v, i| {
            v << 8 | *self.bytes.get(&addr.wrapping_add(i)).unwrap_or(&0) as u32
        })
    }

    fn set(&mut self, addr: u32, len: u32, value: u32) {
        for i in 0..len {
            self.bytes.insert(addr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }
}

impl Memory for MockMemory {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.get(addr, 1) as u8
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.get(addr, 2) as u16
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.get(addr, 4)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.accesses.push(Access::Write8(addr, value));
        self.set(addr, 1, value as u32);
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.accesses.push(Access::Write16(addr, value));
        self.set(addr, 2, value as u32);
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.accesses.push(Access::Write32(addr, value));
        self.set(addr, 4, value);
    }
}

#[derive(Debug, Default)]
pub struct MockPower {
    pub count: usize,
}

impl Power for MockPower {
    fn power_on(&mut self) {
        self.count += 1;
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum CpuEvent {
    DcacheOff,
    IcacheOff,
    MmuOff,
    Call { entry: u32 },
    Kernel { entry: u32, zero: u32, machine: u32, params: u32 },
}

/// Records handoffs instead of jumping
#[derive(Debug, Default)]
pub struct MockCpu {
    pub events: Vec<CpuEvent>,
}

impl Cpu for MockCpu {
    fn dcache_disable(&mut self) {
        self.events.push(CpuEvent::DcacheOff);
    }

    fn icache_disable(&mut self) {
        self.events.push(CpuEvent::IcacheOff);
    }

    fn mmu_disable(&mut self) {
        self.events.push(CpuEvent::MmuOff);
    }

    unsafe fn call(&mut self, entry: u32) {
        self.events.push(CpuEvent::Call { entry });
    }

    unsafe fn call_kernel(&mut self, entry: u32, machine: u32, params: u32) {
        self.events.push(CpuEvent::Kernel { entry, zero: 0, machine, params });
    }
}

/// Little-endian encoding of a word, as sent on the wire
pub fn le32(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}
