use crate::basic::BasicCache;
use crate::cache::{first_result, Cache, CacheResult, KeyVal};
use crate::error::CacheError;

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The outcome of an attempt to load a single key.
///
/// A `value` of `None` with no error means the loader had nothing for the
/// key; it stays a miss and is never written back.
#[derive(Debug)]
pub struct LoaderResult<K, V> {
  pub key: K,
  pub value: Option<V>,
  pub error: Option<CacheError>,
}

/// A bulk loader invoked with exactly the keys missing from the cache.
///
/// It must return one [`LoaderResult`] per requested key.
pub type Loader<K, V> =
  Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, Result<Vec<LoaderResult<K, V>>, CacheError>> + Send + Sync>;

/// A cache that populates itself for missing keys using a bulk [`Loader`].
///
/// Retrieval first consults the wrapped [`BasicCache`]; keys that come back
/// not-found (or with a per-key error) are fetched through the loader in a
/// single call, merged into the response, and inserted back into the cache
/// on a detached task that never delays the caller.
/// Built through [`CacheBuilder`](crate::builder::CacheBuilder).
pub struct LoadingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  inner: Arc<BasicCache<K, V>>,
  loader: Loader<K, V>,
}

impl<K, V> std::fmt::Debug for LoadingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadingCache").finish_non_exhaustive()
  }
}

impl<K, V> LoadingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(inner: BasicCache<K, V>, loader: Loader<K, V>) -> Self {
    Self {
      inner: Arc::new(inner),
      loader,
    }
  }

  /// Runs the loader inside its own task so a panic surfaces as an error
  /// value instead of unwinding into the caller.
  async fn invoke_loader(&self, keys: Vec<K>) -> Result<Vec<LoaderResult<K, V>>, CacheError> {
    let loader = Arc::clone(&self.loader);
    match tokio::spawn(async move { loader(keys).await }).await {
      Ok(outcome) => outcome,
      Err(fault) => Err(CacheError::Loader(fault.to_string())),
    }
  }

  /// Inserts loaded values on a detached task; the response this batch
  /// belongs to has already been handed back to the caller. Failures are
  /// logged and suppressed: warming the cache is best-effort.
  fn write_back(&self, loaded: Vec<(K, Arc<V>)>) {
    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move {
      let cancel = CancellationToken::new();
      for (key, value) in loaded {
        if let Err(error) = inner.put_shared(&cancel, key, value).await {
          warn!(%error, "cache write-back failed");
        }
      }
    });
  }
}

#[async_trait]
impl<K, V> Cache<K, V> for LoadingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  async fn close(&self) {
    self.inner.close().await;
  }

  async fn get(&self, cancel: &CancellationToken, key: &K) -> Result<Option<Arc<V>>, CacheError> {
    let results = self.get_batch(cancel, std::slice::from_ref(key)).await?;
    first_result(results)
  }

  async fn get_batch(
    &self,
    cancel: &CancellationToken,
    keys: &[K],
  ) -> Result<Vec<CacheResult<K, V>>, CacheError> {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }

    let mut results = self.inner.get_batch(cancel, keys).await?;
    if results.len() != keys.len() {
      return Err(CacheError::Unknown(format!(
        "cache returned {} results for {} keys",
        results.len(),
        keys.len()
      )));
    }

    let missing: Vec<K> = results
      .iter()
      .filter(|r| r.error.is_some() || !r.found)
      .map(|r| r.key.clone())
      .collect();
    if missing.is_empty() {
      return Ok(results);
    }

    debug!(missing = missing.len(), "invoking loader for missing keys");
    let loaded = self.invoke_loader(missing.clone()).await?;
    if loaded.len() != missing.len() {
      return Err(CacheError::Unknown(format!(
        "loader returned {} results for {} keys",
        loaded.len(),
        missing.len()
      )));
    }

    let mut to_cache = Vec::new();
    for LoaderResult { key, value, error } in loaded {
      let Some(slot) = results.iter_mut().find(|r| r.key == key) else {
        continue;
      };
      match (error, value) {
        (Some(error), _) => {
          slot.error = Some(error);
          slot.found = false;
        }
        (None, Some(value)) => {
          let value = Arc::new(value);
          slot.value = Some(Arc::clone(&value));
          slot.found = true;
          to_cache.push((key, value));
        }
        // The loader had nothing for this key; it stays a miss.
        (None, None) => {}
      }
    }

    if !to_cache.is_empty() {
      self.write_back(to_cache);
    }
    Ok(results)
  }

  async fn put(&self, cancel: &CancellationToken, key: K, value: V) -> Result<(), CacheError> {
    self.inner.put(cancel, key, value).await
  }

  async fn put_batch(
    &self,
    cancel: &CancellationToken,
    pairs: Vec<KeyVal<K, V>>,
  ) -> Result<(), CacheError> {
    self.inner.put_batch(cancel, pairs).await
  }

  async fn remove(&self, key: &K) -> Result<(), CacheError> {
    self.inner.remove(key).await
  }

  async fn len(&self) -> Result<usize, CacheError> {
    self.inner.len().await
  }
}
