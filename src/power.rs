//! Board power latch

use crate::memory::Memory;

/// Keeps the board powered once the loader is running
pub trait Power {
    /// Latch board power on. No feedback is available.
    fn power_on(&mut self);
}

/// Register layout of an always-on power/reset block
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct AliveRegisters {
    /// Power gate register, writes are ignored unless the gate is open
    pub pwrgate: u32,
    /// GPIO reset register
    pub gpio_reset: u32,
    /// GPIO set register
    pub gpio_set: u32,
    /// Power gate open bit
    pub npowergating: u32,
    /// VDD power-on-reset GPIO bit
    pub vddpwronrst: u32,
}

/// Latches power by pulsing the power-on-reset GPIO through the alive block
pub struct AliveLatch<M> {
    memory: M,
    regs: AliveRegisters,
}

impl<M: Memory> AliveLatch<M> {
    pub fn new(memory: M, regs: AliveRegisters) -> Self {
        Self { memory, regs }
    }
}

impl<M: Memory> Power for AliveLatch<M> {
    fn power_on(&mut self) {
        let r = self.regs;

        self.memory.write_u32(r.pwrgate, r.npowergating);
        self.memory.write_u32(r.gpio_reset, 0);
        self.memory.write_u32(r.gpio_set, r.vddpwronrst);
        self.memory.write_u32(r.gpio_set, 0);
        self.memory.write_u32(r.pwrgate, 0);

        debug!("Power latched");
    }
}
