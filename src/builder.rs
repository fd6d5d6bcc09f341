use crate::basic::BasicCache;
use crate::error::{BuildError, CacheError};
use crate::loading::{Loader, LoaderResult, LoadingCache};

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// The stand-in for an unbounded wait. A zero timeout would otherwise
/// fail every operation immediately.
const EFFECTIVELY_INFINITE: Duration = Duration::from_secs(24 * 60 * 60);

/// A builder for [`BasicCache`] and [`LoadingCache`] instances.
///
/// Defaults: unbounded capacity, effectively infinite timeout, a fresh
/// governing cancellation token, no loader.
pub struct CacheBuilder<K, V> {
  max_entries: usize,
  timeout: Duration,
  cancellation: CancellationToken,
  loader: Option<Loader<K, V>>,
}

impl<K, V> CacheBuilder<K, V> {
  pub fn new() -> Self {
    Self {
      max_entries: 0,
      timeout: Duration::ZERO,
      cancellation: CancellationToken::new(),
      loader: None,
    }
  }

  /// Sets the maximum number of entries before an insertion evicts the
  /// least-recently-used one. Zero (the default) means the cache grows
  /// indefinitely.
  pub fn max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries;
    self
  }

  /// Sets the per-operation timeout.
  ///
  /// Zero is normalized to an effectively infinite 24 hours rather than
  /// fail-immediately (not recommended).
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Binds the cache lifetime to `token`: cancelling it terminates the
  /// owning actor, clears all state, and permanently invalidates the
  /// instance, exactly as `close` does.
  pub fn cancellation(mut self, token: CancellationToken) -> Self {
    self.cancellation = token;
    self
  }

  /// Sets the bulk loader consumed by [`build_loading`](Self::build_loading).
  ///
  /// The loader is called with exactly the keys missing from the cache and
  /// must return one [`LoaderResult`] per requested key.
  pub fn loader<F, Fut>(mut self, loader: F) -> Self
  where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<LoaderResult<K, V>>, CacheError>> + Send + 'static,
  {
    self.loader = Some(Arc::new(move |keys| {
      Box::pin(loader(keys)) as BoxFuture<'static, Result<Vec<LoaderResult<K, V>>, CacheError>>
    }));
    self
  }
}

impl<K, V> CacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Builds a [`BasicCache`] and spawns its owning actor.
  pub fn build(self) -> Result<BasicCache<K, V>, BuildError> {
    self.validate()?;
    Ok(BasicCache::new(
      self.max_entries,
      normalize_timeout(self.timeout),
      &self.cancellation,
    ))
  }

  /// Builds a [`LoadingCache`] around a fresh [`BasicCache`].
  pub fn build_loading(mut self) -> Result<LoadingCache<K, V>, BuildError> {
    self.validate()?;
    let loader = self.loader.take().ok_or(BuildError::MissingLoader)?;
    let inner = BasicCache::new(
      self.max_entries,
      normalize_timeout(self.timeout),
      &self.cancellation,
    );
    Ok(LoadingCache::new(inner, loader))
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.cancellation.is_cancelled() {
      return Err(BuildError::Cancelled);
    }
    Ok(())
  }
}

impl<K, V> Default for CacheBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

fn normalize_timeout(timeout: Duration) -> Duration {
  if timeout.is_zero() {
    EFFECTIVELY_INFINITE
  } else {
    timeout
  }
}
