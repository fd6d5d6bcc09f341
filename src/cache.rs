use crate::error::CacheError;

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A key/value pair submitted to [`Cache::put_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal<K, V> {
  pub key: K,
  pub value: V,
}

/// The per-key outcome of a batch retrieval.
///
/// Every requested key yields exactly one `CacheResult`, even when the
/// retrieval or load of an individual key failed.
#[derive(Debug, Clone)]
pub struct CacheResult<K, V> {
  pub key: K,
  /// The cached (or freshly loaded) value, when one exists.
  pub value: Option<Arc<V>>,
  /// Whether the key counts as present.
  pub found: bool,
  /// A failure scoped to this key alone.
  pub error: Option<CacheError>,
}

/// The capability set implemented by every cache variant.
///
/// All operations are fallible: the owning actor may have terminated, the
/// per-cache timeout may elapse, or the caller's cancellation token may
/// fire while the call is in flight. Callers must inspect the returned
/// error before trusting returned values.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Empties the cache and releases its resources.
  ///
  /// Idempotent; every subsequent operation fails with
  /// [`CacheError::Closed`]. Cancelling the governing token supplied at
  /// construction has the same effect.
  async fn close(&self);

  /// Retrieves the value at `key`, promoting its recency.
  ///
  /// `Ok(None)` is a miss. A per-key failure recorded during a load is
  /// surfaced as the call's error.
  async fn get(&self, cancel: &CancellationToken, key: &K) -> Result<Option<Arc<V>>, CacheError>;

  /// Retrieves all `keys` in a single round trip, one result per key.
  async fn get_batch(
    &self,
    cancel: &CancellationToken,
    keys: &[K],
  ) -> Result<Vec<CacheResult<K, V>>, CacheError>;

  /// Inserts the value at `key`, replacing any prior content.
  async fn put(&self, cancel: &CancellationToken, key: K, value: V) -> Result<(), CacheError>;

  /// Inserts every pair, stopping at the first failure.
  ///
  /// Pairs applied before the failure remain in the cache.
  async fn put_batch(
    &self,
    cancel: &CancellationToken,
    pairs: Vec<KeyVal<K, V>>,
  ) -> Result<(), CacheError>;

  /// Removes `key` and its value, ignoring absent keys.
  async fn remove(&self, key: &K) -> Result<(), CacheError>;

  /// Returns the number of entries currently held.
  async fn len(&self) -> Result<usize, CacheError>;
}

/// Unwraps a single-key batch response into the `get` return shape.
pub(crate) fn first_result<K, V>(
  results: Vec<CacheResult<K, V>>,
) -> Result<Option<Arc<V>>, CacheError> {
  match results.into_iter().next() {
    None => Err(CacheError::Unknown("empty batch response".to_string())),
    Some(result) => match result.error {
      Some(error) => Err(error),
      None if result.found => Ok(result.value),
      None => Ok(None),
    },
  }
}
