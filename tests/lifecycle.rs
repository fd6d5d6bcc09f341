use std::time::Duration;

use strand_cache::{BasicCache, BuildError, Cache, CacheBuilder, CacheError, KeyVal};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const NO_HANG: Duration = Duration::from_secs(5);

fn new_test_cache() -> BasicCache<String, i32> {
  CacheBuilder::new()
    .timeout(Duration::from_secs(5))
    .build()
    .unwrap()
}

// Every post-close call must fail with the availability error without
// hanging; the `timeout` wrapper turns a hang into a test failure.
async fn assert_all_ops_closed(cache: &BasicCache<String, i32>) {
  let call = CancellationToken::new();

  let got = timeout(NO_HANG, cache.get(&call, &"k".to_string())).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);

  let got = timeout(NO_HANG, cache.get_batch(&call, &["k".to_string()])).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);

  let got = timeout(NO_HANG, cache.put(&call, "k".to_string(), 1)).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);

  let pairs = vec![KeyVal {
    key: "k".to_string(),
    value: 1,
  }];
  let got = timeout(NO_HANG, cache.put_batch(&call, pairs)).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);

  let got = timeout(NO_HANG, cache.remove(&"k".to_string())).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);

  let got = timeout(NO_HANG, cache.len()).await.unwrap();
  assert_eq!(got.unwrap_err(), CacheError::Closed);
}

#[tokio::test]
async fn test_close_makes_cache_unusable() {
  let cache = new_test_cache();
  let call = CancellationToken::new();
  cache.put(&call, "k".to_string(), 1).await.unwrap();

  cache.close().await;
  assert_all_ops_closed(&cache).await;
}

#[tokio::test]
async fn test_double_close_is_harmless() {
  let cache = new_test_cache();
  cache.close().await;
  cache.close().await;
  assert_all_ops_closed(&cache).await;
}

#[tokio::test]
async fn test_governing_token_cancellation_invalidates_cache() {
  let governing = CancellationToken::new();
  let cache: BasicCache<String, i32> = CacheBuilder::new()
    .timeout(Duration::from_secs(5))
    .cancellation(governing.clone())
    .build()
    .unwrap();

  let call = CancellationToken::new();
  cache.put(&call, "k".to_string(), 1).await.unwrap();

  governing.cancel();
  assert_all_ops_closed(&cache).await;
}

#[tokio::test]
async fn test_closing_one_cache_leaves_siblings_usable() {
  // Two caches bound to the same governing token: closing one must not
  // tear down the other.
  let governing = CancellationToken::new();
  let first: BasicCache<String, i32> = CacheBuilder::new()
    .cancellation(governing.clone())
    .build()
    .unwrap();
  let second: BasicCache<String, i32> = CacheBuilder::new()
    .cancellation(governing.clone())
    .build()
    .unwrap();

  first.close().await;

  let call = CancellationToken::new();
  second.put(&call, "k".to_string(), 2).await.unwrap();
  assert_eq!(
    second.get(&call, &"k".to_string()).await.unwrap().as_deref(),
    Some(&2)
  );
}

#[tokio::test]
async fn test_per_call_cancellation_aborts_only_that_call() {
  let cache = new_test_cache();

  let cancelled = CancellationToken::new();
  cancelled.cancel();
  assert_eq!(
    cache.get(&cancelled, &"k".to_string()).await.unwrap_err(),
    CacheError::Cancelled
  );
  assert_eq!(
    cache.put(&cancelled, "k".to_string(), 1).await.unwrap_err(),
    CacheError::Cancelled
  );
  assert_eq!(
    cache.get_batch(&cancelled, &["k".to_string()]).await.unwrap_err(),
    CacheError::Cancelled
  );

  // The instance itself is unaffected.
  let call = CancellationToken::new();
  cache.put(&call, "k".to_string(), 1).await.unwrap();
  assert_eq!(cache.get(&call, &"k".to_string()).await.unwrap().as_deref(), Some(&1));
}

#[tokio::test]
async fn test_build_with_cancelled_token_fails() {
  let governing = CancellationToken::new();
  governing.cancel();

  let outcome = CacheBuilder::<String, i32>::new()
    .cancellation(governing)
    .build();
  assert_eq!(outcome.unwrap_err(), BuildError::Cancelled);
}
