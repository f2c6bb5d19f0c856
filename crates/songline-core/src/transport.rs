//! Pooled HTTP transport with retry policy and two timeout classes.
//!
//! Uses async reqwest internally on a shared tokio runtime, but presents a
//! sync interface so phase workers can run on plain or rayon threads.
//! Page fetches use a short whole-request timeout. Downloads bound only the
//! wait for response headers; the body is guarded per read by the stall
//! timeout and overall by the caller's watchdog.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RETRY_AFTER};
use reqwest::{Method, Response};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::FetchError;
use crate::retry::{Outcome, RetryPolicy, retry_with_backoff};

/// Fixed user agent announcing what is fetching the pages
pub const DEFAULT_USER_AGENT: &str = concat!(
    "songline/",
    env!("CARGO_PKG_VERSION"),
    " (lyrics and audio archiver)"
);

/// Transport settings. Built once per run and injected into [`Transport::new`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Whole-request timeout for HTML pages
    pub page_timeout: Duration,
    /// Longest wait for download response headers; also the default
    /// wall-clock budget for the body copy
    pub download_timeout: Duration,
    /// Timeout for the HEAD size probe before a download
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest gap between body chunks before a download read is a stall
    pub stall_timeout: Duration,
    /// Idle connections kept per host
    pub pool_size: usize,
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(15),
            pool_size: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// A fetched HTML page. Non-success statuses are returned, not raised.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("songline-http")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Pooled HTTP client plus the policy it was configured with.
pub struct Transport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_size)
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET an HTML page with the short timeout.
    ///
    /// Retryable statuses are retried per policy; once the budget is spent
    /// the last response is returned with its status for the caller to report.
    pub fn get_page(&self, url: &str) -> Result<Page, FetchError> {
        retry_with_backoff(url, &self.config.retry, &Method::GET, || {
            SHARED_RUNTIME.handle().block_on(async {
                let resp = self
                    .client
                    .get(url)
                    .timeout(self.config.page_timeout)
                    .send()
                    .await
                    .map_err(|e| FetchError::from_reqwest(&e))?;

                let status = resp.status().as_u16();
                let retry_after = retry_after(resp.headers());
                let final_url = resp.url().to_string();
                let body = resp.text().await.map_err(|e| FetchError::from_reqwest(&e))?;

                let page = Page {
                    url: final_url,
                    status,
                    body,
                };
                Ok(self.outcome(page, status, retry_after))
            })
        })
    }

    /// HEAD probe for the resource size. `Ok(None)` when the server omits it.
    pub fn probe_length(&self, url: &str) -> Result<Option<u64>, FetchError> {
        let resp = retry_with_backoff(url, &self.config.retry, &Method::HEAD, || {
            SHARED_RUNTIME.handle().block_on(async {
                let resp = self
                    .client
                    .head(url)
                    .timeout(self.config.probe_timeout)
                    .send()
                    .await
                    .map_err(|e| FetchError::from_reqwest(&e))?;
                let status = resp.status().as_u16();
                let retry_after = retry_after(resp.headers());
                Ok(self.outcome(resp, status, retry_after))
            })
        })?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(content_length(resp.headers()))
    }

    /// GET a binary resource and return a streaming body.
    ///
    /// Only the headers are bounded by the download timeout; the body has no
    /// total deadline here. Returns the reader and the `Content-Length` if
    /// the server sent one.
    pub fn open_download(&self, url: &str) -> Result<(BodyReader, Option<u64>), FetchError> {
        let header_timeout = self.config.download_timeout;
        let resp = retry_with_backoff(url, &self.config.retry, &Method::GET, || {
            SHARED_RUNTIME.handle().block_on(async {
                let resp = tokio::time::timeout(header_timeout, self.client.get(url).send())
                    .await
                    .map_err(|_| {
                        FetchError::Timeout(format!(
                            "no response headers within {}s",
                            header_timeout.as_secs()
                        ))
                    })?
                    .map_err(|e| FetchError::from_reqwest(&e))?;
                let status = resp.status().as_u16();
                let retry_after = retry_after(resp.headers());
                Ok(self.outcome(resp, status, retry_after))
            })
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        let total_bytes = content_length(resp.headers());
        Ok((
            BodyReader::new(resp, self.config.stall_timeout),
            total_bytes,
        ))
    }

    fn outcome<T>(&self, value: T, status: u16, retry_after: Option<Duration>) -> Outcome<T> {
        if self.config.retry.is_retryable_status(status) {
            Outcome::Retry {
                last: value,
                retry_after,
                reason: format!("HTTP {status}"),
            }
        } else {
            Outcome::Done(value)
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Async-to-sync bridge over a response body with a stall timeout.
///
/// Each read blocks on the shared runtime; if no data arrives within the
/// stall timeout the read fails with `TimedOut`.
pub struct BodyReader {
    inner: Pin<Box<dyn AsyncRead + Send>>,
    stall_timeout: Duration,
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyReader")
            .field("stall_timeout", &self.stall_timeout)
            .finish_non_exhaustive()
    }
}

impl BodyReader {
    fn new(resp: Response, stall_timeout: Duration) -> Self {
        let stream = resp.bytes_stream().map(|result| {
            result.map_err(|e| {
                if e.is_timeout() {
                    io::Error::new(io::ErrorKind::TimedOut, e)
                } else {
                    io::Error::other(e)
                }
            })
        });
        let reader = tokio_util::io::StreamReader::new(stream);
        Self {
            inner: Box::pin(reader),
            stall_timeout,
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stall_timeout = self.stall_timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(stall_timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read stalled for {}s", stall_timeout.as_secs()),
                )),
            }
        })
    }
}
