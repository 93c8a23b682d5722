//! duscan - Streaming Disk-Usage Analyser
//!
//! A server that computes the recursive byte-size of every immediate child
//! of a directory and streams partial results to the client while the
//! computation is still running.
//!
//! # Features
//!
//! - **Live progress**: directory sizes stream in over server-sent events
//!   as subtrees resolve, throttled to one estimate per entry per 200 ms.
//!
//! - **Shared scan cache**: every path's size lives in a process-wide
//!   registry whose entries double as in-progress computation handles, so
//!   identical subtrees requested by overlapping clients are sized exactly
//!   once.
//!
//! - **Bounded I/O**: all directory enumeration is gated by one counting
//!   semaphore, capping open directory handles regardless of fan-out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     axum HTTP server                          │
//! │   GET /api/usage (SSE)   POST /api/refresh   GET /api/health  │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ one session per request
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Session: list root, emit items, subscribe to child entries   │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ get_or_create / subscribe
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  UsageCache: path → CacheEntry                                │
//! │  (memo + progress pub/sub + completion signal)                │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ one sizer task per entry
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Sizer: bounded read_dir, recurse through the cache,          │
//! │  aggregate, publish throttled totals, seal the entry          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Serve usage for a directory
//! duscan ~/projects --port 8080
//!
//! # Stream sizes
//! curl -N 'http://127.0.0.1:8080/api/usage?path=/home/me/projects'
//!
//! # Force a rescan of a subtree
//! curl -X POST 'http://127.0.0.1:8080/api/refresh?path=/home/me/projects/target'
//! ```

pub mod config;
pub mod error;
pub mod scan;
pub mod server;

pub use config::{CliArgs, ServeConfig};
pub use error::{EngineError, Result, ScanError};
pub use scan::{ScanEngine, UsageCache, UsageEvent};
