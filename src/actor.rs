use crate::cache::CacheResult;
use crate::store::EvictionStore;

use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Requests queued ahead of the actor. The buffer absorbs bursts without
/// making every caller rendezvous with the loop.
pub(crate) const REQUEST_QUEUE_DEPTH: usize = 100;

pub(crate) struct GetRequest<K, V> {
  pub(crate) keys: Vec<K>,
  pub(crate) reply: oneshot::Sender<Vec<CacheResult<K, V>>>,
}

pub(crate) struct PutRequest<K, V> {
  pub(crate) key: K,
  pub(crate) value: Arc<V>,
  // Shared by every request of one put batch.
  pub(crate) done: mpsc::Sender<()>,
}

pub(crate) struct RemoveRequest<K> {
  pub(crate) key: K,
  pub(crate) done: oneshot::Sender<()>,
}

pub(crate) struct LenRequest {
  pub(crate) reply: oneshot::Sender<usize>,
}

/// The sender half of the actor's request channels, held by the facade.
pub(crate) struct Mailbox<K, V> {
  pub(crate) get: mpsc::Sender<GetRequest<K, V>>,
  pub(crate) put: mpsc::Sender<PutRequest<K, V>>,
  pub(crate) remove: mpsc::Sender<RemoveRequest<K>>,
  pub(crate) len: mpsc::Sender<LenRequest>,
}

/// Spawns the actor task that exclusively owns one [`EvictionStore`].
///
/// Each loop iteration services exactly one request end-to-end; that
/// serialization is the sole correctness mechanism guarding the store.
/// The loop exits when `shutdown` fires or when every request sender has
/// been dropped. On exit it clears the store, drops the receivers, and
/// re-cancels `shutdown` so the facade and any waiting callers observe
/// closure; the instance can never be revived afterwards.
pub(crate) fn spawn<K, V>(max_entries: usize, shutdown: CancellationToken) -> Mailbox<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  let (get_tx, mut get_rx) = mpsc::channel::<GetRequest<K, V>>(REQUEST_QUEUE_DEPTH);
  let (put_tx, mut put_rx) = mpsc::channel::<PutRequest<K, V>>(REQUEST_QUEUE_DEPTH);
  let (remove_tx, mut remove_rx) = mpsc::channel::<RemoveRequest<K>>(REQUEST_QUEUE_DEPTH);
  let (len_tx, mut len_rx) = mpsc::channel::<LenRequest>(REQUEST_QUEUE_DEPTH);

  tokio::spawn(async move {
    let mut store = EvictionStore::new(max_entries);
    debug!(max_entries, "cache actor started");

    loop {
      tokio::select! {
        _ = shutdown.cancelled() => break,
        request = get_rx.recv() => match request {
          None => break,
          Some(GetRequest { keys, reply }) => {
            let results = keys
              .into_iter()
              .map(|key| {
                let value = store.get(&key);
                CacheResult {
                  found: value.is_some(),
                  value,
                  key,
                  error: None,
                }
              })
              .collect();
            // The caller may already have timed out; its receiver being
            // gone is not the actor's problem.
            let _ = reply.send(results);
          }
        },
        request = put_rx.recv() => match request {
          None => break,
          Some(PutRequest { key, value, done }) => {
            store.put(key, value);
            let _ = done.send(()).await;
          }
        },
        request = remove_rx.recv() => match request {
          None => break,
          Some(RemoveRequest { key, done }) => {
            store.remove(&key);
            let _ = done.send(());
          }
        },
        request = len_rx.recv() => match request {
          None => break,
          Some(LenRequest { reply }) => {
            let _ = reply.send(store.len());
          }
        },
      }
    }

    store.clear();
    // Idempotent; wakes callers still parked on a reply so they fail
    // with the availability error instead of waiting out their timeout.
    shutdown.cancel();
    debug!("cache actor stopped");
  });

  Mailbox {
    get: get_tx,
    put: put_tx,
    remove: remove_tx,
    len: len_tx,
  }
}
