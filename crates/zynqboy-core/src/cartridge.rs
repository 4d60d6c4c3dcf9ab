//! Cartridge header parsing.
//!
//! The accelerator does not interpret ROM contents itself; the host parses the
//! header once at load time and programs the cartridge-config register with a
//! packed word describing the memory bank controller and its peripherals.

use thiserror::Error;

/// Lowest header offset the parser needs to see.
pub const HEADER_LEN: usize = 0x150;

const OFFSET_CART_TYPE: usize = 0x147;
const OFFSET_ROM_SIZE: usize = 0x148;
const OFFSET_RAM_SIZE: usize = 0x149;

/// MBC2 carries 512x4-bit internal RAM regardless of the header size code.
const MBC2_RAM_SIZE: u32 = 0x200;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedType(u8),
    #[error("unsupported ROM size code {0:#04x}")]
    UnsupportedRomSize(u8),
    #[error("unsupported RAM size code {0:#04x}")]
    UnsupportedRamSize(u8),
    #[error("ROM too short for a cartridge header ({0} bytes)")]
    TooShort(usize),
}

/// Memory bank controller, by the id the accelerator's config register uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mbc {
    None,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl Mbc {
    /// Hardware id in bits 1-3 of the cartridge-config word.
    pub const fn id(self) -> u32 {
        match self {
            Mbc::None => 0,
            Mbc::Mbc1 => 1,
            Mbc::Mbc2 => 2,
            Mbc::Mbc3 => 3,
            Mbc::Mbc5 => 4,
        }
    }
}

/// Validated cartridge configuration, derived once from the ROM header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RomHeader {
    /// Raw cartridge type byte at 0x147.
    pub cartridge_type: u8,
    pub mbc: Mbc,
    pub has_ram: bool,
    pub has_rtc: bool,
    pub has_rumble: bool,
    /// ROM size declared by the header. The ROM address mask is derived from
    /// the actual file length, not from this.
    pub rom_size: u32,
    /// Cartridge RAM size in bytes, after the MBC2 override.
    pub ram_size: u32,
}

impl RomHeader {
    /// Parses the cartridge header out of raw ROM bytes.
    pub fn parse(rom: &[u8]) -> Result<Self, CartridgeError> {
        if rom.len() < HEADER_LEN {
            return Err(CartridgeError::TooShort(rom.len()));
        }

        let cartridge_type = rom[OFFSET_CART_TYPE];
        let (mbc, has_ram, has_rtc, has_rumble) = match cartridge_type {
            0x00 => (Mbc::None, false, false, false),
            0x01 => (Mbc::Mbc1, false, false, false),
            0x02 | 0x03 => (Mbc::Mbc1, true, false, false),
            0x05 | 0x06 => (Mbc::Mbc2, true, false, false),
            0x0F => (Mbc::Mbc3, false, true, false),
            0x10 => (Mbc::Mbc3, true, true, false),
            0x11 => (Mbc::Mbc3, false, false, false),
            0x12 | 0x13 => (Mbc::Mbc3, true, false, false),
            0x19 => (Mbc::Mbc5, false, false, false),
            0x1A | 0x1B => (Mbc::Mbc5, true, false, false),
            0x1C => (Mbc::Mbc5, false, false, true),
            0x1D | 0x1E => (Mbc::Mbc5, true, false, true),
            other => return Err(CartridgeError::UnsupportedType(other)),
        };

        let rom_size_code = rom[OFFSET_ROM_SIZE];
        if rom_size_code > 0x08 {
            return Err(CartridgeError::UnsupportedRomSize(rom_size_code));
        }
        let rom_size = 32 * 1024 << rom_size_code as u32;
        let ram_size = if mbc == Mbc::Mbc2 {
            MBC2_RAM_SIZE
        } else {
            match rom[OFFSET_RAM_SIZE] {
                0x00 => 0,
                0x02 => 8 * 1024,
                0x03 => 32 * 1024,
                0x04 => 128 * 1024,
                0x05 => 64 * 1024,
                other => return Err(CartridgeError::UnsupportedRamSize(other)),
            }
        };

        Ok(Self {
            cartridge_type,
            mbc,
            has_ram,
            has_rtc,
            has_rumble,
            rom_size,
            ram_size,
        })
    }

    /// Packed word for the cartridge-config register: bit 0 = emulation
    /// enabled, bits 1-3 = MBC id, bit 4 = RAM, bit 5 = RTC, bit 6 = rumble.
    pub fn config_word(&self) -> u32 {
        let mut value = 1;
        value |= self.mbc.id() << 1;
        value |= (self.has_ram as u32) << 4;
        value |= (self.has_rtc as u32) << 5;
        value |= (self.has_rumble as u32) << 6;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let mut rom = vec![0u8; HEADER_LEN];
        rom[OFFSET_CART_TYPE] = cart_type;
        rom[OFFSET_ROM_SIZE] = rom_code;
        rom[OFFSET_RAM_SIZE] = ram_code;
        rom
    }

    #[test]
    fn parses_plain_rom() {
        let header = RomHeader::parse(&rom_with(0x00, 0x00, 0x00)).unwrap();
        assert_eq!(header.mbc, Mbc::None);
        assert!(!header.has_ram);
        assert!(!header.has_rtc);
        assert!(!header.has_rumble);
        assert_eq!(header.rom_size, 32 * 1024);
        assert_eq!(header.ram_size, 0);
    }

    #[test]
    fn parses_mbc1_with_ram() {
        let header = RomHeader::parse(&rom_with(0x03, 0x00, 0x02)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc1);
        assert!(header.has_ram);
        assert_eq!(header.ram_size, 8 * 1024);
    }

    #[test]
    fn parses_mbc3_with_ram_and_rtc() {
        let header = RomHeader::parse(&rom_with(0x10, 0x02, 0x03)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc3);
        assert!(header.has_ram);
        assert!(header.has_rtc);
        assert!(!header.has_rumble);
        assert_eq!(header.rom_size, 128 * 1024);
        assert_eq!(header.ram_size, 32 * 1024);
    }

    #[test]
    fn parses_mbc3_ram_without_rtc() {
        let header = RomHeader::parse(&rom_with(0x13, 0x00, 0x03)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc3);
        assert!(header.has_ram);
        assert!(!header.has_rtc);
    }

    #[test]
    fn parses_rtc_only_cartridge() {
        let header = RomHeader::parse(&rom_with(0x0F, 0x00, 0x00)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc3);
        assert!(!header.has_ram);
        assert!(header.has_rtc);
        assert_eq!(header.ram_size, 0);
    }

    #[test]
    fn parses_mbc5_ram_rumble() {
        let header = RomHeader::parse(&rom_with(0x1E, 0x00, 0x03)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc5);
        assert_eq!(header.mbc.id(), 4);
        assert!(header.has_ram);
        assert!(header.has_rumble);
    }

    #[test]
    fn mbc2_overrides_ram_size() {
        let header = RomHeader::parse(&rom_with(0x05, 0x00, 0x00)).unwrap();
        assert_eq!(header.mbc, Mbc::Mbc2);
        assert!(header.has_ram);
        assert_eq!(header.ram_size, 512);

        // The override wins even when the header declares a size code.
        let header = RomHeader::parse(&rom_with(0x06, 0x00, 0x03)).unwrap();
        assert_eq!(header.ram_size, 512);
    }

    #[test]
    fn rejects_unknown_cartridge_type() {
        assert_eq!(
            RomHeader::parse(&rom_with(0xFF, 0x00, 0x00)),
            Err(CartridgeError::UnsupportedType(0xFF))
        );
    }

    #[test]
    fn rejects_unknown_rom_size_code() {
        assert_eq!(
            RomHeader::parse(&rom_with(0x00, 0xFF, 0x00)),
            Err(CartridgeError::UnsupportedRomSize(0xFF))
        );
    }

    #[test]
    fn rejects_unknown_ram_size_code() {
        assert_eq!(
            RomHeader::parse(&rom_with(0x03, 0x00, 0x01)),
            Err(CartridgeError::UnsupportedRamSize(0x01))
        );
    }

    #[test]
    fn rejects_truncated_rom() {
        assert_eq!(
            RomHeader::parse(&[0u8; 0x100]),
            Err(CartridgeError::TooShort(0x100))
        );
    }

    #[test]
    fn config_word_packs_all_fields() {
        let header = RomHeader::parse(&rom_with(0x10, 0x00, 0x03)).unwrap();
        assert_eq!(header.config_word(), 0x37);

        let header = RomHeader::parse(&rom_with(0x00, 0x00, 0x00)).unwrap();
        assert_eq!(header.config_word(), 0x01);

        let header = RomHeader::parse(&rom_with(0x1E, 0x00, 0x03)).unwrap();
        assert_eq!(header.config_word(), 0x59);
    }
}
