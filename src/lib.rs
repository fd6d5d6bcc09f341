//! A concurrency-safe, bounded least-recently-used cache built on
//! message-passing actors.
//!
//! # Features
//! - **Lock-free mutation**: every cache instance is owned by a single
//!   actor task; all operations are serialized through its request
//!   channels, so the LRU state is never guarded by a lock.
//! - **Bounded waits**: every call resolves by actor reply, per-cache
//!   timeout, or caller-side cancellation, and never by hanging.
//! - **Batch operations**: multi-key retrieval in one round trip and
//!   fail-fast multi-key insertion.
//! - **Load-on-miss**: [`LoadingCache`] bulk-loads missing keys through a
//!   caller-supplied function and back-fills the cache off the read path.
//! - **Partition routing**: [`PartitionedCache`] fans batches out across
//!   named delegate caches and aggregates the results.
//!
//! ```no_run
//! use std::time::Duration;
//! use strand_cache::{Cache, CacheBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheBuilder::<String, String>::new()
//!   .max_entries(1_000)
//!   .timeout(Duration::from_millis(50))
//!   .build()?;
//!
//! let call = CancellationToken::new();
//! cache.put(&call, "user:1".to_string(), "ada".to_string()).await?;
//! let hit = cache.get(&call, &"user:1".to_string()).await?;
//! assert_eq!(hit.as_deref().map(String::as_str), Some("ada"));
//! cache.close().await;
//! # Ok(())
//! # }
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;

// Internal, crate-only modules
mod actor;
mod basic;
mod cache;
mod loading;
mod partition;
mod store;

// Re-export the primary user-facing types for convenience
pub use basic::BasicCache;
pub use builder::CacheBuilder;
pub use cache::{Cache, CacheResult, KeyVal};
pub use error::{BuildError, CacheError};
pub use loading::{Loader, LoaderResult, LoadingCache};
pub use partition::{Partition, PartitionedCache, PartitionedCacheBuilder, Partitioner};
