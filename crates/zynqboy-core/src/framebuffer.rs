//! Overlay framebuffer geometry and pixel packing.
//!
//! The blit engine consumes 16-bit little-endian pixels: bit 15 is the opaque
//! flag and the color sits in the low 15 bits as `bbbbb ggggg rrrrr` (blue in
//! the high bits, red in the low bits, 5 bits per channel). A cleared word is
//! fully transparent, letting the emulated screen show through.

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 144;
pub const FRAME_PIXELS: usize = WIDTH * HEIGHT;

/// A pixel that lets the emulated screen show through.
pub const TRANSPARENT: u16 = 0;

const OPAQUE: u16 = 0x8000;

/// Packs an 8-bit RGB color into an opaque overlay pixel.
pub fn rgb_to_pixel(r: u8, g: u8, b: u8) -> u16 {
    OPAQUE | (r >> 3) as u16 | ((g >> 3) as u16) << 5 | ((b >> 3) as u16) << 10
}

/// Serializes a frame to the little-endian byte stream the blit engine reads.
pub fn pack_frame(pixels: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; pixels.len() * 2];
    for (chunk, pixel) in bytes.chunks_exact_mut(2).zip(pixels) {
        chunk.copy_from_slice(&pixel.to_le_bytes());
    }
    bytes
}
