use crate::partition::Partition;

use std::fmt;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The governing cancellation token had already fired at build time.
  Cancelled,
  /// A loading cache was requested but no loader was configured.
  MissingLoader,
  /// A partitioned cache was requested but no partitioner was configured.
  MissingPartitioner,
  /// A partitioned cache needs at least one partition.
  NoPartitions,
  /// Two partitions were registered under the same name.
  DuplicatePartition(Partition),
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::Cancelled => write!(f, "governing cancellation token has already fired"),
      BuildError::MissingLoader => write!(f, "a loading cache requires a loader"),
      BuildError::MissingPartitioner => write!(f, "a partitioned cache requires a partitioner"),
      BuildError::NoPartitions => write!(f, "a partitioned cache requires at least one partition"),
      BuildError::DuplicatePartition(name) => {
        write!(f, "partition `{name}` was registered more than once")
      }
    }
  }
}

impl std::error::Error for BuildError {}

/// Errors returned by cache operations at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
  /// The cache has been closed and is permanently unusable.
  Closed,
  /// The per-operation timeout elapsed while waiting on the owning actor.
  Timeout,
  /// The caller's cancellation token fired before or during the call.
  Cancelled,
  /// The partitioner resolved a key to a partition with no registered cache.
  UnknownPartition(Partition),
  /// The loader reported a failure, or faulted while running.
  Loader(String),
  /// An internal fault that could not be classified further.
  Unknown(String),
}

impl fmt::Display for CacheError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheError::Closed => write!(f, "cache has been closed and is unusable"),
      CacheError::Timeout => write!(f, "timeout exceeded"),
      CacheError::Cancelled => write!(f, "operation was cancelled"),
      CacheError::UnknownPartition(name) => {
        write!(f, "no cache is registered for partition `{name}`")
      }
      CacheError::Loader(reason) => write!(f, "loader failed: {reason}"),
      CacheError::Unknown(reason) => write!(f, "unknown error: {reason}"),
    }
  }
}

impl std::error::Error for CacheError {}
