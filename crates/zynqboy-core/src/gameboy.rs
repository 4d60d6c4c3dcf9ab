//! High-level facade driving the accelerator.
//!
//! [`GameBoy`] exclusively owns the bus: it is the only writer of registers
//! and joypad lines, and it holds the DMA buffers the hardware is currently
//! reading from. Callers that share it across threads (the input backends all
//! funnel into [`GameBoy::set_button`]) wrap it in a mutex; every operation
//! here takes `&mut self` and serializes naturally under the lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::info;
use thiserror::Error;

use crate::bus::{
    AcceleratorBus, DmaBuffer, JOYPAD_LINE_COUNT, REG_BLIT_ADDRESS, REG_BLIT_CONTROL, REG_CONTROL,
    REG_DEBUG_CPU1, REG_DEBUG_CPU2, REG_DEBUG_CPU3, REG_EMU_CART_CONFIG, REG_RAM_ADDRESS,
    REG_RAM_MASK, REG_ROM_ADDRESS, REG_ROM_MASK, REG_RTC_LATCHED, REG_RTC_LIVE,
    REG_STAT_CACHE_HITS, REG_STAT_CACHE_MISSES, REG_STAT_CLOCKS, REG_STAT_STALLS,
};
use crate::cartridge::{CartridgeError, RomHeader};
use crate::framebuffer::{self, FRAME_PIXELS};
use crate::input::Button;
use crate::rtc::{self, RtcSave, RtcState};
use crate::savefile::{self, SAVE_EXTENSION};

const CONTROL_RUN: u32 = 0x01;
const CONTROL_RESET: u32 = 0x02;
const BLIT_START: u32 = 0x01;

/// Interval between polls of the blit-control register. Blit latency is
/// small and bounded, so the wait itself has no timeout.
const BLIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long the reset bit is held before clearing.
const RESET_PULSE: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Snapshot of the free-running statistics counters.
///
/// All four wrap on overflow; sample them periodically and difference the
/// samples rather than treating them as totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub stalls: u32,
    pub clocks: u32,
    pub cache_hits: u32,
    pub cache_misses: u32,
}

struct EmulatedCartridge {
    header: RomHeader,
    /// Kept resident while the session lives; the accelerator reads it over
    /// DMA at the addresses programmed into the registers.
    rom: Box<dyn DmaBuffer>,
    ram: Option<Box<dyn DmaBuffer>>,
    save_path: PathBuf,
}

pub struct GameBoy {
    bus: Box<dyn AcceleratorBus>,
    framebuffer: Box<dyn DmaBuffer>,
    cartridge: Option<EmulatedCartridge>,
    paused: bool,
    reset_asserted: bool,
    blit_pending: bool,
    buttons: [bool; Button::COUNT],
    play_time: Duration,
    unpaused_at: Option<Instant>,
}

impl GameBoy {
    /// Takes ownership of the bus, allocates the overlay framebuffer, and
    /// drives all joypad lines low. The accelerator starts paused; the
    /// control register is first written by `set_paused` or `reset`.
    pub fn new(mut bus: Box<dyn AcceleratorBus>) -> io::Result<Self> {
        let framebuffer = bus.alloc_dma(FRAME_PIXELS * 2)?;
        for line in 0..JOYPAD_LINE_COUNT {
            bus.set_joypad_line(line, false);
        }

        Ok(Self {
            bus,
            framebuffer,
            cartridge: None,
            paused: true,
            reset_asserted: false,
            blit_pending: false,
            buttons: [false; Button::COUNT],
            play_time: Duration::ZERO,
            unpaused_at: None,
        })
    }

    fn write_control(&mut self) {
        let mut value = 0;
        if !self.paused {
            value |= CONTROL_RUN;
        }
        if self.reset_asserted {
            value |= CONTROL_RESET;
        }
        self.bus.write_register(REG_CONTROL, value);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pauses or resumes the accelerator.
    ///
    /// Unpausing first waits for any pending blit; the hardware must never
    /// run while a blit is in flight.
    pub fn set_paused(&mut self, paused: bool) {
        if !paused {
            self.wait_for_blit_complete();
        }

        if paused != self.paused {
            if paused {
                if let Some(at) = self.unpaused_at.take() {
                    self.play_time += at.elapsed();
                }
            } else {
                self.unpaused_at = Some(Instant::now());
            }
        }

        self.paused = paused;
        self.write_control();
    }

    /// Pulses the reset bit and zeroes the playtime accumulator.
    pub fn reset(&mut self) {
        self.reset_asserted = true;
        self.write_control();
        thread::sleep(RESET_PULSE);
        self.reset_asserted = false;
        self.write_control();

        self.play_time = Duration::ZERO;
        if self.unpaused_at.is_some() {
            self.unpaused_at = Some(Instant::now());
        }
    }

    /// Switches to the physical cartridge slot, releasing any emulated
    /// session.
    pub fn set_physical_cartridge(&mut self) {
        self.cartridge = None;
        self.bus.write_register(REG_EMU_CART_CONFIG, 0);
    }

    /// Loads a ROM file into an emulated cartridge session.
    ///
    /// The load is atomic: the header is parsed before anything is allocated
    /// or written, so an unsupported ROM leaves the previous session and all
    /// registers untouched.
    pub fn set_emulated_cartridge(&mut self, rom_path: &Path) -> Result<(), LoadError> {
        let rom_data = fs::read(rom_path)?;
        let header = RomHeader::parse(&rom_data)?;
        info!(
            "Cartridge {:#04x}: {:?}, rom {} bytes, ram {} bytes",
            header.cartridge_type,
            header.mbc,
            rom_data.len(),
            header.ram_size
        );

        let mut rom = self.bus.alloc_dma(rom_data.len())?;
        rom.write(0, &rom_data);

        let mut ram = if header.ram_size > 0 {
            let mut buffer = self.bus.alloc_dma(header.ram_size as usize)?;
            buffer.fill(0xFF);
            Some(buffer)
        } else {
            None
        };

        // Pull in the previous save, advancing a stored RTC by the wall time
        // that passed since it was written.
        let save_path = rom_path.with_extension(SAVE_EXTENSION);
        let mut rtc_words = None;
        if let Some(save) = savefile::read(&save_path, header.ram_size as usize, header.has_rtc)? {
            if let Some(ram) = &mut ram {
                ram.write(0, &save.ram);
            }
            if let Some(mut stored) = save.rtc {
                let elapsed = rtc::unix_now().saturating_sub(stored.timestamp);
                if !stored.live.halted {
                    stored.live.advance(elapsed);
                }
                rtc_words = Some((stored.live.to_hardware(), stored.latched.to_hardware()));
            }
            info!("Loaded save file from {}", save_path.display());
        }

        let session = EmulatedCartridge {
            header,
            rom,
            ram,
            save_path,
        };

        // Arm the session. Order matters: config first, then addresses and
        // masks, so the hardware never sees a half-programmed cartridge.
        self.bus
            .write_register(REG_EMU_CART_CONFIG, header.config_word());
        self.bus
            .write_register(REG_ROM_ADDRESS, session.rom.device_address());
        self.bus
            .write_register(REG_ROM_MASK, rom_data.len() as u32 - 1);
        match &session.ram {
            Some(ram) => {
                self.bus.write_register(REG_RAM_ADDRESS, ram.device_address());
                self.bus.write_register(REG_RAM_MASK, header.ram_size - 1);
            }
            None => {
                self.bus.write_register(REG_RAM_ADDRESS, 0);
                self.bus.write_register(REG_RAM_MASK, 0);
            }
        }
        if let Some((live, latched)) = rtc_words {
            self.bus.write_register(REG_RTC_LIVE, live);
            self.bus.write_register(REG_RTC_LATCHED, latched);
        }

        self.cartridge = Some(session);
        Ok(())
    }

    /// Writes battery-backed state to the save file. No-op unless the
    /// current session has RAM or an RTC.
    ///
    /// The accelerator is paused while the RAM buffer is read back, then
    /// restored to its previous run state. The save file is replaced
    /// atomically.
    pub fn persist_ram(&mut self) -> io::Result<()> {
        let (has_rtc, save_path) = match &self.cartridge {
            Some(cart) if cart.ram.is_some() || cart.header.has_rtc => {
                (cart.header.has_rtc, cart.save_path.clone())
            }
            _ => return Ok(()),
        };

        let was_paused = self.paused;
        self.set_paused(true);

        let ram = self.cartridge.as_ref().and_then(|cart| {
            cart.ram.as_ref().map(|buffer| {
                let mut bytes = vec![0u8; buffer.len()];
                buffer.read(0, &mut bytes);
                bytes
            })
        });
        let rtc = has_rtc.then(|| RtcSave {
            live: RtcState::from_hardware(self.bus.read_register(REG_RTC_LIVE)),
            latched: RtcState::from_hardware(self.bus.read_register(REG_RTC_LATCHED)),
            timestamp: rtc::unix_now(),
        });

        savefile::write(&save_path, ram.as_deref().unwrap_or(&[]), rtc.as_ref())?;
        info!("Wrote save file to {}", save_path.display());

        if !was_paused {
            self.set_paused(false);
        }
        Ok(())
    }

    /// Records a button state and drives its joypad line, if it has one.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed;
        if let Some(line) = button.joypad_line() {
            self.bus.set_joypad_line(line, pressed);
        }
    }

    pub fn button_pressed(&self, button: Button) -> bool {
        self.buttons[button as usize]
    }

    fn wait_for_blit_complete(&mut self) {
        if self.blit_pending {
            while self.bus.read_register(REG_BLIT_CONTROL) != 0 {
                thread::sleep(BLIT_POLL_INTERVAL);
            }
        }
        self.blit_pending = false;
    }

    /// Copies a packed 160x144 overlay frame to the device framebuffer and
    /// starts a blit.
    ///
    /// Waits out any previous blit, then force-pauses; the caller unpauses
    /// once it wants the accelerator running again, which in turn waits for
    /// this blit to complete.
    ///
    /// Panics if `pixels` is not exactly one frame.
    pub fn copy_framebuffer(&mut self, pixels: &[u16]) {
        assert_eq!(pixels.len(), FRAME_PIXELS, "overlay frame size");

        self.wait_for_blit_complete();
        self.set_paused(true);

        self.framebuffer.write(0, &framebuffer::pack_frame(pixels));
        self.bus
            .write_register(REG_BLIT_ADDRESS, self.framebuffer.device_address());
        self.bus.write_register(REG_BLIT_CONTROL, BLIT_START);
        self.blit_pending = true;
    }

    /// Samples the statistics counters.
    pub fn stats(&mut self) -> Stats {
        Stats {
            stalls: self.bus.read_register(REG_STAT_STALLS),
            clocks: self.bus.read_register(REG_STAT_CLOCKS),
            cache_hits: self.bus.read_register(REG_STAT_CACHE_HITS),
            cache_misses: self.bus.read_register(REG_STAT_CACHE_MISSES),
        }
    }

    /// Samples the emulated-CPU debug words.
    pub fn debug_state(&mut self) -> [u32; 3] {
        [
            self.bus.read_register(REG_DEBUG_CPU1),
            self.bus.read_register(REG_DEBUG_CPU2),
            self.bus.read_register(REG_DEBUG_CPU3),
        ]
    }

    /// Total time spent unpaused. Frozen while paused; the clock-count
    /// register wraps far too quickly to serve as a playtime source.
    pub fn playtime(&self) -> Duration {
        let running = self.unpaused_at.map_or(Duration::ZERO, |at| at.elapsed());
        self.play_time + running
    }
}
