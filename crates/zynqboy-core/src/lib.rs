//! Host-side control plane for the zynqboy FPGA Game Boy accelerator.
//!
//! This crate contains the platform-agnostic control logic: the register
//! protocol, cartridge header parsing, RTC codecs, save-file handling, and the
//! [`gameboy`] facade that orchestrates them. Hardware access goes through the
//! traits in [`bus`]; the Linux/Zynq implementations live in the host crate.

/// Register map and the hardware access traits.
pub mod bus;

/// Cartridge header parsing and the emulated-cartridge support table.
pub mod cartridge;

/// Framebuffer geometry and pixel packing.
pub mod framebuffer;

/// High-level facade driving the accelerator.
pub mod gameboy;

/// Button domain and input backend plumbing.
pub mod input;

/// MBC3-style real-time clock state, codecs, and advance engine.
pub mod rtc;

/// Battery-backed save files.
pub mod savefile;
