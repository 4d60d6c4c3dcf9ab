mod gamepad;
mod system;
mod wii_classic;
mod zynq;

use std::path::PathBuf;

use clap::Parser;
use log::info;
use zynqboy_core::gameboy::GameBoy;

use crate::gamepad::GamepadBackend;
use crate::system::System;
use crate::wii_classic::WiiClassicController;
use crate::zynq::ZynqBus;

#[derive(Parser)]
struct Args {
    /// Path to ROM file; omit to play the physical cartridge
    rom: Option<PathBuf>,

    /// I2C character device for the Wii Classic controller
    #[arg(long, default_value = "/dev/i2c-0")]
    i2c_dev: PathBuf,

    /// GPIO character device carrying the joypad EMIO lines
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpiochip: PathBuf,

    /// u-dma-buf instance backing DMA allocations
    #[arg(long, default_value = "udmabuf0")]
    udmabuf: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    info!("Starting accelerator host");

    let bus = match ZynqBus::open(&args.gpiochip, &args.udmabuf) {
        Ok(bus) => bus,
        Err(e) => {
            eprintln!("Failed to open accelerator: {e}");
            return;
        }
    };
    let mut gameboy = match GameBoy::new(Box::new(bus)) {
        Ok(gameboy) => gameboy,
        Err(e) => {
            eprintln!("Failed to allocate DMA memory: {e}");
            return;
        }
    };

    match &args.rom {
        Some(path) => {
            if let Err(e) = gameboy.set_emulated_cartridge(path) {
                eprintln!("Failed to load ROM: {e}");
                return;
            }
        }
        None => {
            info!("No ROM supplied; using the physical cartridge slot");
            gameboy.set_physical_cartridge();
        }
    }

    let system = System::new(gameboy);

    system.spawn_backend(Box::new(GamepadBackend::new(system.button_callback())));
    match WiiClassicController::open(&args.i2c_dev, system.button_callback()) {
        Ok(controller) => system.spawn_backend(Box::new(controller)),
        Err(e) => {
            eprintln!("Failed to open I2C device: {e}");
            return;
        }
    }

    if let Err(e) = system.run() {
        eprintln!("Shutdown failed: {e}");
    }
}
