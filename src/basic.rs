use crate::actor::{self, GetRequest, LenRequest, Mailbox, PutRequest, RemoveRequest};
use crate::cache::{first_result, Cache, CacheResult, KeyVal};
use crate::error::CacheError;

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// A concurrency-safe, bounded least-recently-used cache.
///
/// All state lives behind a dedicated actor task; this handle only
/// translates calls into request messages and waits on the reply, the
/// per-cache timeout, or a cancellation signal, whichever resolves first.
/// Built through [`CacheBuilder`](crate::builder::CacheBuilder).
pub struct BasicCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  mailbox: Mailbox<K, V>,
  timeout: Duration,
  shutdown: CancellationToken,
}

impl<K, V> std::fmt::Debug for BasicCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BasicCache")
      .field("timeout", &self.timeout)
      .finish_non_exhaustive()
  }
}

impl<K, V> BasicCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// `timeout` must already be normalized by the builder.
  pub(crate) fn new(max_entries: usize, timeout: Duration, governing: &CancellationToken) -> Self {
    // A child token: cancelling the governing token tears this instance
    // down, while closing this instance leaves the parent untouched.
    let shutdown = governing.child_token();
    let mailbox = actor::spawn(max_entries, shutdown.clone());
    Self {
      mailbox,
      timeout,
      shutdown,
    }
  }

  /// Waits on a oneshot reply against the per-cache timeout and the
  /// instance shutdown. A dropped reply sender means the actor discarded
  /// the request while terminating.
  async fn await_reply<T>(&self, reply: oneshot::Receiver<T>) -> Result<T, CacheError> {
    tokio::select! {
      _ = self.shutdown.cancelled() => Err(CacheError::Closed),
      outcome = timeout(self.timeout, reply) => match outcome {
        Err(_) => Err(CacheError::Timeout),
        Ok(Err(_)) => Err(CacheError::Closed),
        Ok(Ok(value)) => Ok(value),
      },
    }
  }

  /// Sends one put request and waits for its acknowledgement on the
  /// batch-shared reply channel.
  async fn put_one(
    &self,
    cancel: &CancellationToken,
    key: K,
    value: Arc<V>,
    done_tx: &mpsc::Sender<()>,
    done_rx: &mut mpsc::Receiver<()>,
  ) -> Result<(), CacheError> {
    let request = PutRequest {
      key,
      value,
      done: done_tx.clone(),
    };
    self
      .mailbox
      .put
      .send(request)
      .await
      .map_err(|_| CacheError::Closed)?;

    tokio::select! {
      _ = cancel.cancelled() => Err(CacheError::Cancelled),
      _ = self.shutdown.cancelled() => Err(CacheError::Closed),
      outcome = timeout(self.timeout, done_rx.recv()) => match outcome {
        Err(_) => Err(CacheError::Timeout),
        Ok(None) => Err(CacheError::Closed),
        Ok(Some(())) => Ok(()),
      },
    }
  }

  /// Inserts an already-shared value, used by the loading decorator's
  /// write-back path so loaded values are not cloned into the cache.
  pub(crate) async fn put_shared(
    &self,
    cancel: &CancellationToken,
    key: K,
    value: Arc<V>,
  ) -> Result<(), CacheError> {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }
    if self.shutdown.is_cancelled() {
      return Err(CacheError::Closed);
    }

    let (done_tx, mut done_rx) = mpsc::channel(1);
    self.put_one(cancel, key, value, &done_tx, &mut done_rx).await
  }
}

#[async_trait]
impl<K, V> Cache<K, V> for BasicCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  async fn close(&self) {
    self.shutdown.cancel();
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
    if self.shutdown.is_cancelled() {
      return Err(CacheError::Closed);
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    let request = GetRequest {
      keys: keys.to_vec(),
      reply: reply_tx,
    };
    self
      .mailbox
      .get
      .send(request)
      .await
      .map_err(|_| CacheError::Closed)?;

    tokio::select! {
      _ = cancel.cancelled() => Err(CacheError::Cancelled),
      outcome = self.await_reply(reply_rx) => outcome,
    }
  }

  async fn put(&self, cancel: &CancellationToken, key: K, value: V) -> Result<(), CacheError> {
    self.put_batch(cancel, vec![KeyVal { key, value }]).await
  }

  async fn put_batch(
    &self,
    cancel: &CancellationToken,
    pairs: Vec<KeyVal<K, V>>,
  ) -> Result<(), CacheError> {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }
    if pairs.is_empty() {
      return Ok(());
    }
    if self.shutdown.is_cancelled() {
      return Err(CacheError::Closed);
    }

    // One reply channel serves the whole batch; each pair is still an
    // individual request so the actor interleaves fairly with other
    // callers. Fail-fast: pairs applied before an error stay applied.
    let (done_tx, mut done_rx) = mpsc::channel(1);
    for KeyVal { key, value } in pairs {
      self
        .put_one(cancel, key, Arc::new(value), &done_tx, &mut done_rx)
        .await?;
    }
    Ok(())
  }

  async fn remove(&self, key: &K) -> Result<(), CacheError> {
    if self.shutdown.is_cancelled() {
      return Err(CacheError::Closed);
    }

    let (done_tx, done_rx) = oneshot::channel();
    let request = RemoveRequest {
      key: key.clone(),
      done: done_tx,
    };
    self
      .mailbox
      .remove
      .send(request)
      .await
      .map_err(|_| CacheError::Closed)?;
    self.await_reply(done_rx).await
  }

  async fn len(&self) -> Result<usize, CacheError> {
    if self.shutdown.is_cancelled() {
      return Err(CacheError::Closed);
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .mailbox
      .len
      .send(LenRequest { reply: reply_tx })
      .await
      .map_err(|_| CacheError::Closed)?;
    self.await_reply(reply_rx).await
  }
}
