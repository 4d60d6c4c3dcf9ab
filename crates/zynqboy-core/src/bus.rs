//! Accelerator register map and hardware access traits.
//!
//! The accelerator exposes a fixed-layout register file in a 64 KiB window of
//! 4-byte slots, a set of GPIO-style joypad output lines, and reads ROM/RAM/
//! framebuffer data over DMA from physically contiguous buffers. All three
//! surfaces sit behind [`AcceleratorBus`] so the control logic can be driven
//! against a real Zynq bus or an in-memory stub.

use std::io;

/// Control register. Bit 0 = run (inverse of paused), bit 1 = reset pulse.
pub const REG_CONTROL: usize = 0x00;
/// Emulated-cartridge configuration word (see [`crate::cartridge`]).
pub const REG_EMU_CART_CONFIG: usize = 0x04;
/// Device address of the ROM buffer.
pub const REG_ROM_ADDRESS: usize = 0x08;
/// ROM address mask (file length - 1).
pub const REG_ROM_MASK: usize = 0x0C;
/// Device address of the cartridge RAM buffer, 0 when the cartridge has none.
pub const REG_RAM_ADDRESS: usize = 0x10;
/// RAM address mask (RAM size - 1), 0 when the cartridge has none.
pub const REG_RAM_MASK: usize = 0x14;
/// Emulated CPU debug words, read-only.
pub const REG_DEBUG_CPU1: usize = 0x18;
pub const REG_DEBUG_CPU2: usize = 0x1C;
pub const REG_DEBUG_CPU3: usize = 0x20;
/// Free-running memory stall counter, wraps.
pub const REG_STAT_STALLS: usize = 0x24;
/// Free-running emulated clock counter, wraps.
pub const REG_STAT_CLOCKS: usize = 0x28;
/// Blit control. Bit 0 = blit in progress; set by the host, cleared by
/// hardware on completion.
pub const REG_BLIT_CONTROL: usize = 0x2C;
/// Device address of the overlay framebuffer to blit.
pub const REG_BLIT_ADDRESS: usize = 0x30;
/// Live RTC counters, hardware packing (see [`crate::rtc`]).
pub const REG_RTC_LIVE: usize = 0x34;
/// Latched RTC snapshot, hardware packing.
pub const REG_RTC_LATCHED: usize = 0x38;
/// Free-running cartridge-cache hit counter, wraps.
pub const REG_STAT_CACHE_HITS: usize = 0x3C;
/// Free-running cartridge-cache miss counter, wraps.
pub const REG_STAT_CACHE_MISSES: usize = 0x40;

/// Size of the memory-mapped register window.
pub const REGISTER_WINDOW_LEN: usize = 64 * 1024;

/// Number of GPIO joypad lines wired to the accelerator.
pub const JOYPAD_LINE_COUNT: usize = 8;

/// A physically contiguous, device-visible buffer.
///
/// The accelerator reads ROM/RAM/framebuffer contents through its own DMA
/// master, so buffers must stay resident at a stable device address for the
/// lifetime of the session that programmed them into the registers.
pub trait DmaBuffer: Send {
    /// Address the accelerator uses to reach this buffer.
    fn device_address(&self) -> u32;

    /// Buffer length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `bytes` into the buffer starting at `offset`.
    ///
    /// Panics if the range falls outside the buffer.
    fn write(&mut self, offset: usize, bytes: &[u8]);

    /// Copies buffer contents starting at `offset` into `out`.
    ///
    /// Panics if the range falls outside the buffer.
    fn read(&self, offset: usize, out: &mut [u8]);

    /// Fills the whole buffer with `value`.
    fn fill(&mut self, value: u8);
}

/// Host-visible surface of the accelerator: registers, joypad lines, and DMA
/// allocation.
///
/// Exactly one [`crate::gameboy::GameBoy`] owns the bus; nothing else may
/// touch registers. Every register access is direct and ordered, with no
/// caching or retries. Offsets must be 4-byte aligned and inside the register
/// window; violating that is a programming error and implementations are free
/// to panic.
pub trait AcceleratorBus: Send {
    fn read_register(&mut self, offset: usize) -> u32;

    fn write_register(&mut self, offset: usize, value: u32);

    /// Drives one joypad line high (pressed) or low. Lines are indexed
    /// 0..[`JOYPAD_LINE_COUNT`].
    fn set_joypad_line(&mut self, line: usize, high: bool);

    /// Allocates a device-visible buffer of `len` bytes.
    fn alloc_dma(&mut self, len: usize) -> io::Result<Box<dyn DmaBuffer>>;
}
