//! Transfer of CPU control to loaded code

use crate::protocol::NO_PARAMS;

/// A control transfer requested over the link
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Jump {
    /// Call `entry()` with no arguments
    Plain { entry: u32 },
    /// Call `entry(0, machine, params)` using the kernel boot convention
    Kernel { entry: u32, machine: u32 },
}

/// Cache and MMU units present on the target
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Units {
    pub dcache: bool,
    pub icache: bool,
    pub mmu: bool,
}

/// CPU primitives required to hand over control
pub trait Cpu {
    fn dcache_disable(&mut self);
    fn icache_disable(&mut self);
    fn mmu_disable(&mut self);

    /// Call a procedure taking no arguments.
    ///
    /// # Safety
    ///
    /// `entry` must be the address of executable code using the C ABI.
    unsafe fn call(&mut self, entry: u32) {
        let f: extern "C" fn() = core::mem::transmute(entry as usize);
        f();
    }

    /// Call a kernel entry point with `(0, machine, params)` in the first
    /// three argument registers.
    ///
    /// # Safety
    ///
    /// `entry` must be the address of executable code using the C ABI.
    unsafe fn call_kernel(&mut self, entry: u32, machine: u32, params: u32) {
        let f: extern "C" fn(u32, u32, u32) = core::mem::transmute(entry as usize);
        f(0, machine, params);
    }
}

/// Executes [`Jump`]s after quiescing caches and the MMU
pub struct Handoff<C> {
    cpu: C,
    units: Units,
}

impl<C: Cpu> Handoff<C> {
    pub fn new(cpu: C, units: Units) -> Self {
        Self { cpu, units }
    }

    /// Disable the data cache, instruction cache and MMU, in that order,
    /// skipping units the target does not have
    pub fn quiesce(&mut self) {
        if self.units.dcache {
            self.cpu.dcache_disable();
        }
        if self.units.icache {
            self.cpu.icache_disable();
        }
        if self.units.mmu {
            self.cpu.mmu_disable();
        }
    }

    /// Quiesce and call into `jump`.
    ///
    /// Only returns if the called code does.
    ///
    /// # Safety
    ///
    /// The jump target must be executable code, see [`Cpu::call`].
    pub unsafe fn transfer(&mut self, jump: Jump) {
        debug!("Handing off: {:x?}", jump);

        self.quiesce();

        match jump {
            Jump::Plain { entry } => self.cpu.call(entry),
            Jump::Kernel { entry, machine } => self.cpu.call_kernel(entry, machine, NO_PARAMS),
        }
    }

    /// Hand control to `jump`. Does not return.
    ///
    /// The link is trusted, addresses are executed without any checks.
    pub fn execute(&mut self, jump: Jump) -> ! {
        unsafe { self.transfer(jump) };

        warn!("Handoff target returned");
        idle()
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }
}

/// Park the CPU forever
pub fn idle() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CpuEvent, MockCpu};

    #[test]
    fn kernel_convention() {
        let units = Units { dcache: true, icache: true, mmu: true };
        let mut h = Handoff::new(MockCpu::default(), units);

        unsafe { h.transfer(Jump::Kernel { entry: 0x8000, machine: 2028 }) };

        assert_eq!(
            h.cpu().events,
            vec![
                CpuEvent::DcacheOff,
                CpuEvent::IcacheOff,
                CpuEvent::MmuOff,
                CpuEvent::Kernel { entry: 0x8000, zero: 0, machine: 2028, params: 0xFFFF_FFFF },
            ]
        );
    }

    #[test]
    fn absent_units_are_skipped() {
        let units = Units { dcache: false, icache: true, mmu: false };
        let mut h = Handoff::new(MockCpu::default(), units);

        unsafe { h.transfer(Jump::Plain { entry: 0x0000_0200 }) };

        assert_eq!(
            h.cpu().events,
            vec![CpuEvent::IcacheOff, CpuEvent::Call { entry: 0x200 }]
        );
    }
}
