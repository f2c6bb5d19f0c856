//! Songline Core - HTTP and runtime plumbing for page scraping pipelines
//!
//! This crate knows nothing about songs. It provides the pooled fetch
//! transport with its retry policy, the stall-guarded body reader,
//! cooperative shutdown, logging and progress display.

pub mod error;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod transport;
pub mod work_queue;

// Re-exports for convenience
pub use error::{FetchError, excerpt};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::RetryPolicy;
pub use shutdown::{is_shutdown_requested, shutdown_flag};
pub use transport::{BodyReader, HttpConfig, Page, SHARED_RUNTIME, Transport};
pub use work_queue::WorkQueue;
