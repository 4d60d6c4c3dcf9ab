//! Battery-backed save files.
//!
//! A save file is the cartridge RAM image, optionally followed by the 48-byte
//! RTC trailer, sitting next to the ROM with a `.sav` extension. Writes go
//! through a temporary file and a rename so an interrupted persist leaves the
//! previous save intact.

use std::fs;
use std::io;
use std::path::Path;

use crate::rtc::RtcSave;

/// Extension of the save file sibling to the ROM.
pub const SAVE_EXTENSION: &str = "sav";

const TMP_EXTENSION: &str = "sav.tmp";

/// Parsed save-file contents.
pub struct SaveFile {
    /// RAM payload. May be shorter than the cartridge RAM when the file is.
    pub ram: Vec<u8>,
    /// RTC trailer, when one was expected and present.
    pub rtc: Option<RtcSave>,
}

/// Reads the save at `path`; `Ok(None)` when there is no file. The trailer is
/// only looked for when `expect_rtc` is set, and a file too short to hold one
/// counts as having no RTC data rather than being an error.
pub fn read(path: &Path, ram_len: usize, expect_rtc: bool) -> io::Result<Option<SaveFile>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let ram = data[..ram_len.min(data.len())].to_vec();
    let rtc = if expect_rtc && data.len() >= ram_len + RtcSave::LEN {
        let trailer = data[ram_len..ram_len + RtcSave::LEN].try_into().unwrap();
        Some(RtcSave::from_bytes(trailer))
    } else {
        None
    };
    Ok(Some(SaveFile { ram, rtc }))
}

/// Writes `ram` followed by the optional RTC trailer, atomically replacing
/// any existing save.
pub fn write(path: &Path, ram: &[u8], rtc: Option<&RtcSave>) -> io::Result<()> {
    let mut data = Vec::with_capacity(ram.len() + RtcSave::LEN);
    data.extend_from_slice(ram);
    if let Some(rtc) = rtc {
        data.extend_from_slice(&rtc.to_bytes());
    }

    let tmp = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::RtcState;

    fn save_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("game.sav")
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&save_path(&dir), 0x2000, false).unwrap().is_none());
    }

    #[test]
    fn ram_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);
        let ram = vec![0xAB; 0x2000];

        write(&path, &ram, None).unwrap();
        let save = read(&path, ram.len(), false).unwrap().unwrap();
        assert_eq!(save.ram, ram);
        assert!(save.rtc.is_none());
    }

    #[test]
    fn trailer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);
        let ram = vec![0x11; 512];
        let rtc = RtcSave {
            live: RtcState {
                seconds: 1,
                minutes: 2,
                hours: 3,
                days: 4,
                day_carry: false,
                halted: false,
            },
            latched: RtcState::default(),
            timestamp: 1_700_000_000,
        };

        write(&path, &ram, Some(&rtc)).unwrap();
        let save = read(&path, ram.len(), true).unwrap().unwrap();
        assert_eq!(save.ram, ram);
        assert_eq!(save.rtc, Some(rtc));
    }

    #[test]
    fn short_file_loads_partially() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);

        write(&path, &[0x22; 16], None).unwrap();
        let save = read(&path, 0x2000, false).unwrap().unwrap();
        assert_eq!(save.ram, vec![0x22; 16]);
    }

    #[test]
    fn missing_trailer_means_no_rtc_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);

        write(&path, &[0x33; 512], None).unwrap();
        let save = read(&path, 512, true).unwrap().unwrap();
        assert!(save.rtc.is_none());
    }

    #[test]
    fn trailer_ignored_when_rtc_not_expected() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);
        let rtc = RtcSave {
            live: RtcState::default(),
            latched: RtcState::default(),
            timestamp: 42,
        };

        write(&path, &[0x44; 512], Some(&rtc)).unwrap();
        let save = read(&path, 512, false).unwrap().unwrap();
        assert!(save.rtc.is_none());
    }

    #[test]
    fn write_leaves_no_temporary_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir);

        write(&path, &[0u8; 8], None).unwrap();
        assert!(path.is_file());
        assert!(!path.with_extension(TMP_EXTENSION).exists());
    }
}
