//! Accelerator access on the Zynq PS.
//!
//! Three kernel interfaces back the [`AcceleratorBus`] trait here: the
//! register window is a `/dev/mem` mapping of the AXI slave, the joypad
//! lines are EMIO GPIOs claimed through the gpiochip character device, and
//! DMA memory comes from a u-dma-buf instance whose physical address the
//! driver exports through sysfs.

use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Mutex};

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::warn;
use memmap2::{MmapOptions, MmapRaw};
use zynqboy_core::bus::{AcceleratorBus, DmaBuffer, JOYPAD_LINE_COUNT, REGISTER_WINDOW_LEN};

/// Physical base of the accelerator's AXI register window.
const REGISTER_WINDOW_BASE: u64 = 0x43C0_0000;

/// First EMIO line on the Zynq gpiochip; the 54 MIO pins come before it.
const EMIO_LINE_BASE: u32 = 54;

/// The joypad lines start this many EMIO lines in.
const JOYPAD_EMIO_OFFSET: u32 = 8;

/// DMA allocations are page aligned so the accelerator's burst reads never
/// straddle two buffers.
const DMA_ALIGN: usize = 4096;

// Linux O_SYNC. Both mappings have hardware on the other side, so writes
// must not linger in the cache.
const O_SYNC: i32 = 0o4010000;

pub struct ZynqBus {
    registers: MmapRaw,
    joypad: Vec<LineHandle>,
    pool: DmaPool,
}

impl ZynqBus {
    /// Maps the register window, claims the joypad GPIO lines, and opens the
    /// u-dma-buf pool. Needs root (or matching udev rules) for `/dev/mem`.
    pub fn open(gpiochip: &Path, udmabuf: &str) -> io::Result<Self> {
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open("/dev/mem")?;
        let registers = MmapOptions::new()
            .offset(REGISTER_WINDOW_BASE)
            .len(REGISTER_WINDOW_LEN)
            .map_raw(&mem)?;

        let mut chip = Chip::new(gpiochip).map_err(io::Error::other)?;
        let mut joypad = Vec::with_capacity(JOYPAD_LINE_COUNT);
        for index in 0..JOYPAD_LINE_COUNT as u32 {
            let line = chip
                .get_line(EMIO_LINE_BASE + JOYPAD_EMIO_OFFSET + index)
                .map_err(io::Error::other)?;
            let handle = line
                .request(LineRequestFlags::OUTPUT, 0, "zynqboy")
                .map_err(io::Error::other)?;
            joypad.push(handle);
        }

        Ok(Self {
            registers,
            joypad,
            pool: DmaPool::open(udmabuf)?,
        })
    }

    fn register_ptr(&self, offset: usize) -> *mut u32 {
        assert!(
            offset < REGISTER_WINDOW_LEN && offset % 4 == 0,
            "bad register offset {offset:#x}"
        );
        unsafe { self.registers.as_mut_ptr().add(offset).cast::<u32>() }
    }
}

impl AcceleratorBus for ZynqBus {
    fn read_register(&mut self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile(self.register_ptr(offset)) }
    }

    fn write_register(&mut self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile(self.register_ptr(offset), value) }
    }

    fn set_joypad_line(&mut self, line: usize, high: bool) {
        if let Err(e) = self.joypad[line].set_value(high as u8) {
            warn!("Joypad line {line} write failed: {e}");
        }
    }

    fn alloc_dma(&mut self, len: usize) -> io::Result<Box<dyn DmaBuffer>> {
        Ok(Box::new(self.pool.alloc(len)?))
    }
}

/// Allocator over one u-dma-buf region. Dropped buffers put their pages back
/// on the free list, so replacing a cartridge session reuses the space its
/// predecessor held rather than eating through the pool.
struct DmaPool {
    map: Arc<MmapRaw>,
    device_base: u32,
    free: Arc<Mutex<FreeList>>,
}

impl DmaPool {
    fn open(name: &str) -> io::Result<Self> {
        let device_base = read_sysfs_hex(name, "phys_addr")?;
        let len = read_sysfs_dec(name, "size")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open(format!("/dev/{name}"))?;
        let map = MmapOptions::new().len(len).map_raw(&file)?;

        Ok(Self {
            map: Arc::new(map),
            device_base,
            free: Arc::new(Mutex::new(FreeList::new(len))),
        })
    }

    fn alloc(&self, len: usize) -> io::Result<UdmaBuffer> {
        let padded = len.next_multiple_of(DMA_ALIGN);
        let mut free = match self.free.lock() {
            Ok(free) => free,
            Err(poisoned) => poisoned.into_inner(),
        };
        let offset = match free.take(padded) {
            Some(offset) => offset,
            None => {
                return Err(io::Error::other(format!(
                    "u-dma-buf exhausted: {len} bytes requested, {} free",
                    free.available()
                )));
            }
        };

        Ok(UdmaBuffer {
            map: Arc::clone(&self.map),
            free: Arc::clone(&self.free),
            device_address: self.device_base + offset as u32,
            offset,
            len,
        })
    }
}

/// Free ranges of the pool as `(offset, len)` pairs, sorted by offset.
/// Neighbours merge on release, so a freed session coalesces back into one
/// block instead of fragmenting.
#[derive(Debug)]
struct FreeList {
    ranges: Vec<(usize, usize)>,
}

impl FreeList {
    fn new(len: usize) -> Self {
        Self {
            ranges: vec![(0, len)],
        }
    }

    /// First-fit: carves `len` bytes off the front of the first range that
    /// can hold them.
    fn take(&mut self, len: usize) -> Option<usize> {
        let index = self.ranges.iter().position(|&(_, free)| free >= len)?;
        let (offset, free) = self.ranges[index];
        if free == len {
            self.ranges.remove(index);
        } else {
            self.ranges[index] = (offset + len, free - len);
        }
        Some(offset)
    }

    fn release(&mut self, offset: usize, len: usize) {
        let index = self.ranges.partition_point(|&(start, _)| start < offset);
        self.ranges.insert(index, (offset, len));
        self.merge_with_next(index);
        if index > 0 {
            self.merge_with_next(index - 1);
        }
    }

    fn merge_with_next(&mut self, index: usize) {
        if let Some(&(above, above_len)) = self.ranges.get(index + 1) {
            let (start, len) = self.ranges[index];
            if start + len == above {
                self.ranges[index] = (start, len + above_len);
                self.ranges.remove(index + 1);
            }
        }
    }

    fn available(&self) -> usize {
        self.ranges.iter().map(|&(_, len)| len).sum()
    }
}

fn read_sysfs_hex(name: &str, attr: &str) -> io::Result<u32> {
    let text = fs::read_to_string(format!("/sys/class/u-dma-buf/{name}/{attr}"))?;
    u32::from_str_radix(text.trim().trim_start_matches("0x"), 16).map_err(io::Error::other)
}

fn read_sysfs_dec(name: &str, attr: &str) -> io::Result<usize> {
    let text = fs::read_to_string(format!("/sys/class/u-dma-buf/{name}/{attr}"))?;
    text.trim().parse().map_err(io::Error::other)
}

/// One slice of the u-dma-buf mapping. The accelerator reads it by physical
/// address while the host writes it through the shared map. Dropping the
/// buffer returns its pages to the pool.
#[derive(Debug)]
struct UdmaBuffer {
    map: Arc<MmapRaw>,
    free: Arc<Mutex<FreeList>>,
    device_address: u32,
    offset: usize,
    len: usize,
}

impl Drop for UdmaBuffer {
    fn drop(&mut self) {
        if let Ok(mut free) = self.free.lock() {
            free.release(self.offset, self.len.next_multiple_of(DMA_ALIGN));
        }
    }
}

impl DmaBuffer for UdmaBuffer {
    fn device_address(&self) -> u32 {
        self.device_address
    }

    fn len(&self) -> usize {
        self.len
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.len, "DMA write out of range");
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.map.as_mut_ptr().add(self.offset + offset),
                bytes.len(),
            );
        }
    }

    fn read(&self, offset: usize, out: &mut [u8]) {
        assert!(offset + out.len() <= self.len, "DMA read out of range");
        unsafe {
            ptr::copy_nonoverlapping(
                self.map.as_ptr().add(self.offset + offset),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    fn fill(&mut self, value: u8) {
        unsafe {
            ptr::write_bytes(self.map.as_mut_ptr().add(self.offset), value, self.len);
        }
    }
}
