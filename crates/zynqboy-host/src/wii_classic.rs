//! Wii Classic controller input backend.
//!
//! The pad speaks the Nintendo extension-controller protocol on I2C address
//! 0x52. After an unencrypted init handshake it serves an 8-byte status
//! report per poll; button bits are active low. The backend reconnects
//! forever, so the pad can be unplugged and replugged mid-game.

use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::{debug, info};
use zynqboy_core::input::{Button, ButtonCallback, InputBackend};

const I2C_ADDRESS: u16 = 0x52;
const STATUS_LEN: usize = 8;

const INIT_DELAY: Duration = Duration::from_millis(100);
const COMMAND_DELAY: Duration = Duration::from_millis(2);
const RETRY_DELAY: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Byte and bit positions of each button in the status report.
const BUTTON_BITS: [(Button, usize, u8); 9] = [
    (Button::A, 5, 4),
    (Button::B, 5, 6),
    (Button::Start, 4, 2),
    (Button::Select, 4, 4),
    (Button::Home, 4, 3),
    (Button::Left, 5, 1),
    (Button::Right, 4, 7),
    (Button::Up, 5, 0),
    (Button::Down, 4, 6),
];

/// Raw I2C operations the protocol sits on. Split out so tests can script
/// the port.
trait I2cPort: Send {
    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()>;
    fn write_command(&mut self, command: u8) -> io::Result<()>;
    fn read_byte(&mut self) -> io::Result<u8>;
}

struct LinuxPort(LinuxI2CDevice);

impl I2cPort for LinuxPort {
    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()> {
        self.0
            .smbus_write_byte_data(register, value)
            .map_err(io::Error::other)
    }

    fn write_command(&mut self, command: u8) -> io::Result<()> {
        self.0.smbus_write_byte(command).map_err(io::Error::other)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.0.smbus_read_byte().map_err(io::Error::other)
    }
}

pub struct WiiClassicController {
    port: Box<dyn I2cPort>,
    callback: ButtonCallback,
}

impl WiiClassicController {
    /// Opens the I2C character device. A missing device is fatal here;
    /// errors after open are retried inside [`InputBackend::run`].
    pub fn open(path: &Path, callback: ButtonCallback) -> io::Result<Self> {
        let device = LinuxI2CDevice::new(path, I2C_ADDRESS).map_err(io::Error::other)?;
        Ok(Self::with_port(Box::new(LinuxPort(device)), callback))
    }

    fn with_port(port: Box<dyn I2cPort>, callback: ButtonCallback) -> Self {
        Self { port, callback }
    }

    /// Runs the init handshake and returns the device id byte.
    fn connect(&mut self) -> io::Result<u8> {
        self.port.write_register(0xF0, 0x55)?;
        thread::sleep(INIT_DELAY);
        self.port.write_register(0xFB, 0x00)?;
        thread::sleep(INIT_DELAY);
        self.port.write_command(0xFE)?;
        thread::sleep(COMMAND_DELAY);
        self.port.read_byte()
    }

    fn poll(&mut self) -> io::Result<[u8; STATUS_LEN]> {
        self.port.write_command(0x00)?;
        thread::sleep(COMMAND_DELAY);
        let mut status = [0u8; STATUS_LEN];
        for byte in &mut status {
            *byte = self.port.read_byte()?;
        }
        Ok(status)
    }
}

fn decode_status(status: &[u8; STATUS_LEN]) -> [(Button, bool); 9] {
    BUTTON_BITS.map(|(button, byte, bit)| (button, status[byte] & (1 << bit) == 0))
}

impl InputBackend for WiiClassicController {
    fn run(mut self: Box<Self>) {
        loop {
            let id = loop {
                match self.connect() {
                    Ok(id) => break id,
                    Err(e) => {
                        debug!("Wii Classic handshake failed: {e}");
                        thread::sleep(RETRY_DELAY);
                    }
                }
            };
            info!("Connected to Wii Classic controller (id {id})");

            loop {
                match self.poll() {
                    Ok(status) => {
                        for (button, pressed) in decode_status(&status) {
                            (self.callback)(button, pressed);
                        }
                    }
                    Err(e) => {
                        info!("Wii Classic controller disconnected: {e}");
                        break;
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
