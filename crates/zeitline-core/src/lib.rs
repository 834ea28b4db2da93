//! Zeitline Core - Orchestration infrastructure for archive scraping
//!
//! This crate provides the reusable machinery around a scraping run:
//! proxy rotation, request rate limiting, the HTTP fetch client,
//! durable checkpoints, append-only output shards, and the shared
//! logging / progress / shutdown plumbing.

pub mod checkpoint;
pub mod client;
pub mod error;
pub mod logging;
pub mod progress;
pub mod proxy;
pub mod rate;
pub mod retry;
pub mod shutdown;
pub mod sink;

// Re-exports for convenience
pub use checkpoint::{CheckpointStore, load_skip_set};
pub use client::{FetchClient, FetchSuccess};
pub use error::{FetchError, WorkerError};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use proxy::{PoolExhausted, ProxyIdentity, ProxyRotator};
pub use rate::RateLimiter;
pub use retry::RetryPolicy;
pub use shutdown::{clear_shutdown, is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{FailureRecord, JsonlSink};
