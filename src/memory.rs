//! Raw access to the target address space.
//!
//! Every address handed to the monitor comes straight off the link. The
//! [`Memory`] trait is the only path from the protocol to the address space,
//! and [`RawMemory`] is the only implementation that dereferences pointers.

/// Byte, halfword and word access to absolute addresses
pub trait Memory {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn read_u16(&mut self, addr: u32) -> u16;
    fn read_u32(&mut self, addr: u32) -> u32;

    fn write_u8(&mut self, addr: u32, value: u8);
    fn write_u16(&mut self, addr: u32, value: u16);
    fn write_u32(&mut self, addr: u32, value: u32);
}

impl<M: Memory + ?Sized> Memory for &mut M {
    fn read_u8(&mut self, addr: u32) -> u8 {
        (**self).read_u8(addr)
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        (**self).read_u16(addr)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        (**self).read_u32(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        (**self).write_u8(addr, value)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        (**self).write_u16(addr, value)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        (**self).write_u32(addr, value)
    }
}

/// Unchecked volatile view of the physical address space
#[derive(Clone, Debug)]
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// # Safety
    ///
    /// Any address passed to the returned view is dereferenced as-is. The
    /// caller must be running without memory protection on a target where
    /// a bad address faults the machine rather than corrupting another
    /// program, and halfword/word accesses must be naturally aligned.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Memory for RawMemory {
    fn read_u8(&mut self, addr: u32) -> u8 {
        unsafe { core::ptr::read_volatile(addr as usize as *const u8) }
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        unsafe { core::ptr::read_volatile(addr as usize as *const u16) }
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        unsafe { core::ptr::write_volatile(addr as usize as *mut u8, value) }
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        unsafe { core::ptr::write_volatile(addr as usize as *mut u16, value) }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
