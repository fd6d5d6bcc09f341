use crate::cache::{Cache, CacheResult, KeyVal};
use crate::error::{BuildError, CacheError};

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// A named subset of the key space routed to a dedicated delegate cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition(String);

impl Partition {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Partition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Partition {
  fn from(name: &str) -> Self {
    Self(name.to_string())
  }
}

impl From<String> for Partition {
  fn from(name: String) -> Self {
    Self(name)
  }
}

/// Resolves the [`Partition`] for a key. Errors propagate to the caller of
/// the operation that needed the resolution.
pub type Partitioner<K> = Arc<dyn Fn(&K) -> Result<Partition, CacheError> + Send + Sync>;

type PartitionTable<K, V> = HashMap<Partition, Box<dyn Cache<K, V>>, ahash::RandomState>;

/// A cache that splits entries into named partitions by key, delegating
/// every operation to the cache registered for the resolved partition.
///
/// This lets commonly used but slowly changing data avoid eviction
/// pressure from noisier key ranges. Batch retrievals spanning several
/// partitions fan out concurrently, one call per distinct delegate.
pub struct PartitionedCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  partitioner: Partitioner<K>,
  // Immutable after construction except for `close`, which empties it.
  // The delegates serialize their own state; this lock only guards the
  // table itself.
  partitions: RwLock<PartitionTable<K, V>>,
}

impl<K, V> fmt::Debug for PartitionedCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PartitionedCache").finish_non_exhaustive()
  }
}

impl<K, V> PartitionedCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub fn builder() -> PartitionedCacheBuilder<K, V> {
    PartitionedCacheBuilder::new()
  }

  /// Resolves the delegate for `key` within an already-acquired table.
  /// An empty table means the router has been closed.
  fn resolve<'t>(
    &self,
    table: &'t PartitionTable<K, V>,
    key: &K,
  ) -> Result<&'t dyn Cache<K, V>, CacheError> {
    if table.is_empty() {
      return Err(CacheError::Closed);
    }
    let partition = (self.partitioner)(key)?;
    match table.get(&partition) {
      Some(cache) => Ok(cache.as_ref()),
      None => Err(CacheError::UnknownPartition(partition)),
    }
  }
}

#[async_trait]
impl<K, V> Cache<K, V> for PartitionedCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  async fn close(&self) {
    let mut table = self.partitions.write().await;
    for cache in table.values() {
      cache.close().await;
    }
    table.clear();
  }

  async fn get(&self, cancel: &CancellationToken, key: &K) -> Result<Option<Arc<V>>, CacheError> {
    let table = self.partitions.read().await;
    self.resolve(&table, key)?.get(cancel, key).await
  }

  async fn get_batch(
    &self,
    cancel: &CancellationToken,
    keys: &[K],
  ) -> Result<Vec<CacheResult<K, V>>, CacheError> {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }

    let table = self.partitions.read().await;

    // Resolve every key up front; any resolution error aborts the whole
    // call before a single delegate is contacted.
    let mut groups: Vec<(Partition, Vec<K>)> = Vec::new();
    for key in keys {
      if table.is_empty() {
        return Err(CacheError::Closed);
      }
      let partition = (self.partitioner)(key)?;
      if !table.contains_key(&partition) {
        return Err(CacheError::UnknownPartition(partition));
      }
      if let Some(position) = groups.iter().position(|(name, _)| *name == partition) {
        groups[position].1.push(key.clone());
      } else {
        groups.push((partition, vec![key.clone()]));
      }
    }

    // One concurrent batch call per distinct delegate.
    let calls = groups.iter().map(|(partition, group)| async {
      match table.get(partition) {
        Some(cache) => cache.get_batch(cancel, group).await,
        None => Err(CacheError::UnknownPartition(partition.clone())),
      }
    });
    let outcomes = future::join_all(calls).await;

    let mut results = Vec::with_capacity(keys.len());
    for outcome in outcomes {
      results.extend(outcome?);
    }
    Ok(results)
  }

  async fn put(&self, cancel: &CancellationToken, key: K, value: V) -> Result<(), CacheError> {
    let table = self.partitions.read().await;
    self.resolve(&table, &key)?.put(cancel, key, value).await
  }

  async fn put_batch(
    &self,
    cancel: &CancellationToken,
    pairs: Vec<KeyVal<K, V>>,
  ) -> Result<(), CacheError> {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }

    let table = self.partitions.read().await;
    for KeyVal { key, value } in pairs {
      self.resolve(&table, &key)?.put(cancel, key, value).await?;
    }
    Ok(())
  }

  async fn remove(&self, key: &K) -> Result<(), CacheError> {
    let table = self.partitions.read().await;
    self.resolve(&table, key)?.remove(key).await
  }

  async fn len(&self) -> Result<usize, CacheError> {
    let table = self.partitions.read().await;
    if table.is_empty() {
      return Err(CacheError::Closed);
    }
    let mut total = 0;
    for cache in table.values() {
      total += cache.len().await?;
    }
    Ok(total)
  }
}

/// A builder for [`PartitionedCache`] instances.
///
/// Registered caches are owned by the router once built; closing the
/// router closes them all.
pub struct PartitionedCacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  partitioner: Option<Partitioner<K>>,
  partitions: Vec<(Partition, Box<dyn Cache<K, V>>)>,
}

impl<K, V> PartitionedCacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      partitioner: None,
      partitions: Vec::new(),
    }
  }

  /// Sets the function that maps each key to its partition.
  pub fn partitioner<F>(mut self, partitioner: F) -> Self
  where
    F: Fn(&K) -> Result<Partition, CacheError> + Send + Sync + 'static,
  {
    self.partitioner = Some(Arc::new(partitioner));
    self
  }

  /// Registers the delegate cache serving `name`.
  pub fn partition(mut self, name: impl Into<Partition>, cache: impl Cache<K, V> + 'static) -> Self {
    self.partitions.push((name.into(), Box::new(cache)));
    self
  }

  pub fn build(self) -> Result<PartitionedCache<K, V>, BuildError> {
    let partitioner = self.partitioner.ok_or(BuildError::MissingPartitioner)?;
    if self.partitions.is_empty() {
      return Err(BuildError::NoPartitions);
    }

    let mut table = PartitionTable::default();
    for (name, cache) in self.partitions {
      if table.contains_key(&name) {
        return Err(BuildError::DuplicatePartition(name));
      }
      table.insert(name, cache);
    }

    Ok(PartitionedCache {
      partitioner,
      partitions: RwLock::new(table),
    })
  }
}

impl<K, V> Default for PartitionedCacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
