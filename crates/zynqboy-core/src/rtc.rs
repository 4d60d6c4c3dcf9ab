//! MBC3-style real-time clock state.
//!
//! The clock lives in the accelerator; the host only moves whole snapshots
//! across two wire formats. The hardware registers pack all counters into one
//! 32-bit word; save files use the 20-byte five-word layout, stored as a
//! live/latched pair followed by the Unix time of the last persist so the
//! clock can be advanced by the wall time that passed while powered off.

use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const HOURS_PER_DAY: u64 = 24;
const DAY_WRAP: u64 = 512;

/// One RTC snapshot.
///
/// Valid ranges are seconds/minutes 0..=59, hours 0..=23, days 0..=511. The
/// codecs keep out-of-range values representable (the hardware fields are
/// wider than the valid ranges); [`RtcState::advance`] normalizes them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RtcState {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days: u16,
    /// Set when the day counter wrapped past 511. Latches until overwritten.
    pub day_carry: bool,
    /// Halts the clock. The accelerator stops counting and loads skip the
    /// wall-time advance while this is set.
    pub halted: bool,
}

impl RtcState {
    /// Packs into the hardware register layout: seconds[5:0], minutes[11:6],
    /// hours[16:12], days[25:17], day carry[26], halt[27].
    pub fn to_hardware(self) -> u32 {
        let mut word = self.seconds as u32 & 0x3F;
        word |= (self.minutes as u32 & 0x3F) << 6;
        word |= (self.hours as u32 & 0x1F) << 12;
        word |= (self.days as u32 & 0x01FF) << 17;
        word |= (self.day_carry as u32) << 26;
        word |= (self.halted as u32) << 27;
        word
    }

    pub fn from_hardware(word: u32) -> Self {
        Self {
            seconds: (word & 0x3F) as u8,
            minutes: (word >> 6 & 0x3F) as u8,
            hours: (word >> 12 & 0x1F) as u8,
            days: (word >> 17 & 0x01FF) as u16,
            day_carry: word & 1 << 26 != 0,
            halted: word & 1 << 27 != 0,
        }
    }

    /// Packs into the on-disk layout: five little-endian u32 words holding
    /// seconds, minutes, hours, days low byte, and a flags word with day
    /// bit 8 (bit 0), halt (bit 6), and day carry (bit 7).
    pub fn to_disk(self) -> [u8; 20] {
        let mut flags = (self.days >> 8) as u32 & 0x01;
        flags |= (self.halted as u32) << 6;
        flags |= (self.day_carry as u32) << 7;

        let words = [
            self.seconds as u32,
            self.minutes as u32,
            self.hours as u32,
            self.days as u32 & 0xFF,
            flags,
        ];
        let mut bytes = [0u8; 20];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn from_disk(bytes: &[u8; 20]) -> Self {
        let mut words = [0u32; 5];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Self {
            seconds: (words[0] & 0x3F) as u8,
            minutes: (words[1] & 0x3F) as u8,
            hours: (words[2] & 0x1F) as u8,
            days: (words[3] & 0xFF) as u16 | ((words[4] & 0x01) << 8) as u16,
            halted: words[4] & 1 << 6 != 0,
            day_carry: words[4] & 1 << 7 != 0,
        }
    }

    /// Advances the clock by a number of wall-clock seconds, carrying
    /// seconds into minutes into hours into days. A day count passing 511
    /// wraps and latches `day_carry`; there is no further carry to
    /// propagate. Equivalent to `elapsed_seconds` single-second ticks, with
    /// out-of-range counters normalized before new ticks accumulate. A
    /// total past `u64::MAX` seconds saturates there.
    pub fn advance(&mut self, elapsed_seconds: u64) {
        let total_seconds = elapsed_seconds.saturating_add(self.seconds as u64);
        self.seconds = (total_seconds % SECONDS_PER_MINUTE) as u8;

        let total_minutes = self.minutes as u64 + total_seconds / SECONDS_PER_MINUTE;
        self.minutes = (total_minutes % MINUTES_PER_HOUR) as u8;

        let total_hours = self.hours as u64 + total_minutes / MINUTES_PER_HOUR;
        self.hours = (total_hours % HOURS_PER_DAY) as u8;

        let total_days = self.days as u64 + total_hours / HOURS_PER_DAY;
        self.days = (total_days % DAY_WRAP) as u16;
        if total_days >= DAY_WRAP {
            self.day_carry = true;
        }
    }
}

/// The 48-byte save-file trailer: live state, latched state, and the Unix
/// time at which they were read from the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtcSave {
    pub live: RtcState,
    pub latched: RtcState,
    pub timestamp: u64,
}

impl RtcSave {
    pub const LEN: usize = 48;

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut bytes = [0u8; Self::LEN];
        bytes[0..20].copy_from_slice(&self.live.to_disk());
        bytes[20..40].copy_from_slice(&self.latched.to_disk());
        bytes[40..48].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        Self {
            live: RtcState::from_disk(bytes[0..20].try_into().unwrap()),
            latched: RtcState::from_disk(bytes[20..40].try_into().unwrap()),
            timestamp: u64::from_le_bytes(bytes[40..48].try_into().unwrap()),
        }
    }
}

/// Current Unix time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
