//! Where pages and audio come from.
//!
//! [`PageSource`] is the seam between the phase runner and the network:
//! production uses [`HttpSource`], tests substitute an in-memory fake.

use std::path::Path;
use std::time::Duration;

use indicatif::ProgressBar;
use songline_core::{FetchError, HttpConfig, Page, Transport};

use crate::download::{DownloadResult, Downloader};

pub trait PageSource: Sync {
    /// GET a page. Non-success statuses come back as a [`Page`], not an error.
    fn fetch_page(&self, url: &str) -> Result<Page, FetchError>;

    /// Stream `url` to `dest`, reporting bytes on `pb`.
    fn download(&self, url: &str, dest: &Path, pb: &ProgressBar) -> DownloadResult;
}

/// Live source backed by the pooled transport
#[derive(Debug)]
pub struct HttpSource {
    transport: Transport,
    chunk_size: usize,
    watchdog: Duration,
}

impl HttpSource {
    /// The download watchdog defaults to the transport's download timeout.
    pub fn new(http: HttpConfig, chunk_size: usize) -> Result<Self, FetchError> {
        let watchdog = http.download_timeout;
        Ok(Self {
            transport: Transport::new(http)?,
            chunk_size,
            watchdog,
        })
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl PageSource for HttpSource {
    fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        self.transport.get_page(url)
    }

    fn download(&self, url: &str, dest: &Path, pb: &ProgressBar) -> DownloadResult {
        Downloader::new(&self.transport, self.chunk_size, self.watchdog).download(url, dest, pb)
    }
}
