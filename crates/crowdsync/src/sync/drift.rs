//! `<file>.crc32` companions.
//!
//! A companion holds the decimal CRC32 of the content a file was last
//! reconciled against, so later passes can tell whether anything changed
//! without asking the remote.

use std::path::{Path, PathBuf};

use super::error::{Result, SyncError};

pub fn checksum(content: &[u8]) -> u32 {
    crc32fast::hash(content)
}

pub fn companion_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".crc32");
    PathBuf::from(name)
}

/// Stored checksum, or `None` when the companion is missing or unreadable.
pub fn read_companion(path: &Path) -> Option<u32> {
    std::fs::read_to_string(companion_path(path))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

pub fn write_companion(path: &Path, crc: u32) -> Result<()> {
    let companion = companion_path(path);
    std::fs::write(&companion, crc.to_string()).map_err(SyncError::io(companion))
}

/// Whether the companion of `path` is missing or records another checksum.
pub fn is_stale(path: &Path, expected: u32) -> bool {
    read_companion(path) != Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn companion_sits_next_to_file() {
        assert_eq!(
            companion_path(Path::new("docs/ja/a.md")),
            PathBuf::from("docs/ja/a.md.crc32")
        );
    }

    #[test]
    fn stale_until_written() {
        let dir = TempDir::new().expect("tempdir");
        let file = dir.path().join("a.html");
        let crc = checksum(b"<h1>A</h1>");
        assert!(is_stale(&file, crc));

        write_companion(&file, crc).expect("write");
        assert!(!is_stale(&file, crc));
        assert!(is_stale(&file, checksum(b"<h1>B</h1>")));
        assert_eq!(
            std::fs::read_to_string(companion_path(&file)).expect("read"),
            crc.to_string()
        );
    }
}
