//! Local file access for `file://` URLs

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{Error, Result};

/// Path behind a `file://` URL, `None` for any other scheme
pub(super) fn local_path(url: &str) -> Option<PathBuf> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.scheme() != "file" {
        return None;
    }
    parsed.to_file_path().ok()
}

/// Read `range` (or everything) of the file at `path` off the async runtime
pub(super) async fn read(path: PathBuf, range: Option<Range<u64>>) -> Result<Bytes> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || read_blocking(&path, range))
        .await
        .map_err(|err| Error::Io {
            path: display,
            reason: err.to_string(),
        })?
}

fn io_error(path: &Path, err: impl ToString) -> Error {
    Error::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn checked_range(path: &Path, range: Option<Range<u64>>, len: u64) -> Result<Range<usize>> {
    let range = range.unwrap_or(0..len);
    if range.start > range.end || range.end > len {
        return Err(io_error(
            path,
            format!("range {}..{} beyond {len} byte file", range.start, range.end),
        ));
    }
    let start = usize::try_from(range.start).map_err(|err| io_error(path, err))?;
    let end = usize::try_from(range.end).map_err(|err| io_error(path, err))?;
    Ok(start..end)
}

#[cfg(feature = "mmap")]
fn read_blocking(path: &Path, range: Option<Range<u64>>) -> Result<Bytes> {
    use memmap2::MmapOptions;

    let file = File::open(path).map_err(|err| io_error(path, err))?;
    let len = file.metadata().map_err(|err| io_error(path, err))?.len();
    let range = checked_range(path, range, len)?;
    if range.is_empty() {
        return Ok(Bytes::new());
    }

    // SAFETY: read-only mapping; the slice is copied out before the map drops
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|err| io_error(path, err))?;
    Ok(Bytes::copy_from_slice(&mmap[range]))
}

#[cfg(not(feature = "mmap"))]
fn read_blocking(path: &Path, range: Option<Range<u64>>) -> Result<Bytes> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path).map_err(|err| io_error(path, err))?;
    let len = file.metadata().map_err(|err| io_error(path, err))?.len();
    let range = checked_range(path, range, len)?;

    let mut buffer = vec![0u8; range.len()];
    file.seek(SeekFrom::Start(range.start as u64))
        .map_err(|err| io_error(path, err))?;
    file.read_exact(&mut buffer)
        .map_err(|err| io_error(path, err))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path() {
        assert!(local_path("https://example.org/blob.bin").is_none());
        assert!(local_path("relative/path.csv").is_none());
        let url = url::Url::from_file_path(std::env::temp_dir().join("blob.bin")).unwrap();
        assert_eq!(
            local_path(url.as_str()),
            Some(std::env::temp_dir().join("blob.bin"))
        );
    }
}
