//! Scriptable in-memory accelerator bus.
//!
//! `TestBus` stands in for the Zynq MMIO window: it logs every register and
//! joypad write in order, hands out fake DMA buffers, and can be scripted to
//! report a busy blit for a set number of polls. Tests keep the shared
//! [`BusState`] handle and inspect it while the `GameBoy` owns the bus.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use zynqboy_core::bus::{AcceleratorBus, DmaBuffer, REG_BLIT_CONTROL};
use zynqboy_core::gameboy::GameBoy;

#[derive(Default)]
pub struct BusState {
    registers: HashMap<usize, u32>,
    /// Every register write, in order.
    pub writes: Vec<(usize, u32)>,
    /// Every joypad line change, in order.
    pub joypad: Vec<(usize, bool)>,
    /// How many further blit-control reads report busy before it clears.
    pub blit_busy_reads: u32,
    /// Total blit-control reads observed.
    pub blit_reads: u32,
    buffers: Vec<(u32, Arc<Mutex<Vec<u8>>>)>,
    next_address: u32,
}

impl BusState {
    /// Last value written to a register, or 0 if it was never written.
    #[allow(dead_code)]
    pub fn register(&self, offset: usize) -> u32 {
        self.registers.get(&offset).copied().unwrap_or(0)
    }

    /// Seeds a register value for the next read.
    #[allow(dead_code)]
    pub fn set_register(&mut self, offset: usize, value: u32) {
        self.registers.insert(offset, value);
    }

    /// DMA buffer by allocation order, as (device address, contents). The
    /// framebuffer is always index 0; a cartridge load allocates ROM then RAM.
    #[allow(dead_code)]
    pub fn buffer(&self, index: usize) -> (u32, Vec<u8>) {
        let (address, bytes) = &self.buffers[index];
        (*address, bytes.lock().unwrap().clone())
    }

    #[allow(dead_code)]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Overwrites part of a DMA buffer, as the accelerator would.
    #[allow(dead_code)]
    pub fn patch_buffer(&self, index: usize, offset: usize, data: &[u8]) {
        let mut bytes = self.buffers[index].1.lock().unwrap();
        bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}

pub struct TestBus {
    state: Arc<Mutex<BusState>>,
}

impl TestBus {
    pub fn new() -> (Self, Arc<Mutex<BusState>>) {
        let state = Arc::new(Mutex::new(BusState {
            next_address: 0x1000_0000,
            ..BusState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap()
    }
}

impl AcceleratorBus for TestBus {
    fn read_register(&mut self, offset: usize) -> u32 {
        let mut state = self.state();
        if offset == REG_BLIT_CONTROL {
            state.blit_reads += 1;
            if state.blit_busy_reads > 0 {
                state.blit_busy_reads -= 1;
                return 1;
            }
            return 0;
        }
        state.register(offset)
    }

    fn write_register(&mut self, offset: usize, value: u32) {
        let mut state = self.state();
        state.registers.insert(offset, value);
        state.writes.push((offset, value));
    }

    fn set_joypad_line(&mut self, line: usize, high: bool) {
        self.state().joypad.push((line, high));
    }

    fn alloc_dma(&mut self, len: usize) -> io::Result<Box<dyn DmaBuffer>> {
        let mut state = self.state();
        let address = state.next_address;
        state.next_address += (len as u32).next_multiple_of(0x1000);
        let bytes = Arc::new(Mutex::new(vec![0u8; len]));
        state.buffers.push((address, Arc::clone(&bytes)));
        Ok(Box::new(TestDma { address, bytes }))
    }
}

struct TestDma {
    address: u32,
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl DmaBuffer for TestDma {
    fn device_address(&self) -> u32 {
        self.address
    }

    fn len(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        self.bytes.lock().unwrap()[offset..offset + data.len()].copy_from_slice(data);
    }

    fn read(&self, offset: usize, out: &mut [u8]) {
        out.copy_from_slice(&self.bytes.lock().unwrap()[offset..offset + out.len()]);
    }

    fn fill(&mut self, value: u8) {
        self.bytes.lock().unwrap().fill(value);
    }
}

/// A minimal ROM image with the given header bytes.
#[allow(dead_code)]
pub fn rom_image(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 32 * 1024 << rom_code as usize];
    rom[0x0147] = cart_type;
    rom[0x0148] = rom_code;
    rom[0x0149] = ram_code;
    rom
}

/// A `GameBoy` on a fresh `TestBus`, plus the observation handle.
#[allow(dead_code)]
pub fn boot() -> (GameBoy, Arc<Mutex<BusState>>) {
    let (bus, state) = TestBus::new();
    let gb = GameBoy::new(Box::new(bus)).expect("test bus allocation cannot fail");
    (gb, state)
}
