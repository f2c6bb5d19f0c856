//! Streamed audio downloads guarded by a wall-clock watchdog.
//!
//! The body is copied in fixed-size chunks into `<dest>.part`. After every
//! chunk the elapsed time since the stream started is compared against the
//! watchdog limit; a transfer that keeps trickling data past the limit is
//! abandoned even though no single read timed out. The `.part` file is
//! renamed to `<dest>` only on success and removed on any failure.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use songline_core::progress::upgrade_to_bar;
use songline_core::{FetchError, Transport, excerpt};

/// Default read size per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Characters of an underlying error kept in a failure message
const EXCERPT_CHARS: usize = 50;

/// Outcome of one download. `message` is `"Success"` or a short reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub success: bool,
    pub message: String,
}

impl DownloadResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "Success".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    fn from_fetch_error(e: &FetchError) -> Self {
        if e.is_timeout() {
            Self::failed("Download timeout")
        } else {
            Self::failed(format!("Network error: {}", excerpt(e, EXCERPT_CHARS)))
        }
    }

    fn from_copy_error(e: &CopyError) -> Self {
        match e {
            CopyError::Watchdog => Self::failed("Download timeout exceeded"),
            CopyError::Read(e) if e.kind() == io::ErrorKind::TimedOut => {
                Self::failed("Download timeout")
            }
            CopyError::Read(e) => {
                Self::failed(format!("Network error: {}", excerpt(e, EXCERPT_CHARS)))
            }
            CopyError::Write(e) => Self::failed(file_error(e)),
        }
    }
}

fn file_error(e: &io::Error) -> String {
    format!("File error: {}", excerpt(e, EXCERPT_CHARS))
}

/// Why [`copy_with_watchdog`] stopped early
#[derive(Debug)]
pub enum CopyError {
    /// Total elapsed time passed the limit
    Watchdog,
    Read(io::Error),
    Write(io::Error),
}

/// Copy `reader` into `writer` chunk by chunk, returning bytes written.
///
/// The watchdog is checked after each chunk, so the limit can be overrun by
/// at most one read.
pub fn copy_with_watchdog<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    max_duration: Duration,
    pb: &ProgressBar,
) -> Result<u64, CopyError> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut written = 0u64;
    let start = Instant::now();

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        written += n as u64;
        pb.inc(n as u64);

        if start.elapsed() > max_duration {
            return Err(CopyError::Watchdog);
        }
    }
    writer.flush().map_err(CopyError::Write)?;
    Ok(written)
}

/// `<dest>.part`
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Downloads a single resource to disk over a shared [`Transport`].
pub struct Downloader<'a> {
    transport: &'a Transport,
    chunk_size: usize,
    max_duration: Duration,
}

impl<'a> Downloader<'a> {
    pub fn new(transport: &'a Transport, chunk_size: usize, max_duration: Duration) -> Self {
        Self {
            transport,
            chunk_size,
            max_duration,
        }
    }

    /// Fetch `url` into `dest`. Never panics, never returns an error:
    /// every failure is folded into the [`DownloadResult`] message.
    pub fn download(&self, url: &str, dest: &Path, pb: &ProgressBar) -> DownloadResult {
        // Size probe is best effort
        match self.transport.probe_length(url) {
            Ok(Some(len)) => upgrade_to_bar(pb, len),
            Ok(None) => {}
            Err(e) => log::debug!("Size probe failed for {url}: {e}"),
        }

        let (mut reader, total) = match self.transport.open_download(url) {
            Ok(opened) => opened,
            Err(e) => return DownloadResult::from_fetch_error(&e),
        };
        if let Some(len) = total {
            if pb.length() != Some(len) {
                upgrade_to_bar(pb, len);
            }
        }

        let part = part_path(dest);
        let mut file = match File::create(&part) {
            Ok(f) => f,
            Err(e) => return DownloadResult::failed(file_error(&e)),
        };

        let copied = copy_with_watchdog(
            &mut reader,
            &mut file,
            self.chunk_size,
            self.max_duration,
            pb,
        );
        drop(file);

        let result = match copied {
            Ok(bytes) => match std::fs::rename(&part, dest) {
                Ok(()) => {
                    log::debug!("{url}: {bytes} bytes -> {}", dest.display());
                    return DownloadResult::ok();
                }
                Err(e) => DownloadResult::failed(file_error(&e)),
            },
            Err(e) => DownloadResult::from_copy_error(&e),
        };

        if let Err(e) = std::fs::remove_file(&part) {
            log::debug!("Cannot remove {}: {e}", part.display());
        }
        result
    }
}
