//! Single-flight table: at most one in-flight computation per key, with all
//! concurrent callers sharing its result.
//!
//! The first caller for a key becomes the leader and runs the work on a
//! spawned task, so a disconnecting HTTP caller never cancels a generation
//! other waiters are sharing. Later callers subscribe to a broadcast of the
//! leader's result. The table entry is removed once the work settles —
//! before the result is broadcast — so the map stays bounded and late
//! arrivals fall through to the persisted result.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::backend::BackendError;

/// Failure of a shared generation. `Clone` so one leader error can be
/// re-thrown to every waiter.
#[derive(Debug, Clone, Error)]
pub enum FlightError {
    #[error("generation timed out")]
    Timeout,

    #[error("generation failed: {0}")]
    Backend(String),

    #[error("generated graph invalid: {0}")]
    InvalidGraph(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl From<BackendError> for FlightError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout => FlightError::Timeout,
            BackendError::Api(m) => FlightError::Backend(m),
            BackendError::Malformed(m) => FlightError::Backend(format!("malformed output: {m}")),
        }
    }
}

impl From<FlightError> for AppError {
    fn from(e: FlightError) -> Self {
        match e {
            FlightError::Storage(m) => AppError::Internal(anyhow!("storage failure: {m}")),
            FlightError::Internal(m) => AppError::Internal(anyhow!(m)),
            other => AppError::Generation(other.to_string()),
        }
    }
}

type ResultTx<T> = broadcast::Sender<Result<T, FlightError>>;

/// Keyed single-flight table. Cheap to clone; all clones share one map.
pub struct Flights<T> {
    inner: Arc<Mutex<HashMap<Uuid, ResultTx<T>>>>,
}

impl<T> Clone for Flights<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Flights<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Flights<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys currently in flight.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.inner.lock().expect("flight table poisoned").len()
    }
}

enum Role<T> {
    Leader(ResultTx<T>),
    Waiter(broadcast::Receiver<Result<T, FlightError>>),
}

impl<T: Clone + Send + 'static> Flights<T> {
    /// Runs `work` under the single-flight lock for `key`.
    ///
    /// Exactly one concurrent caller executes `work`; every caller receives
    /// the same `Ok` value or the same error.
    pub async fn run<F, Fut>(&self, key: Uuid, work: F) -> Result<T, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FlightError>> + Send + 'static,
    {
        let role = {
            let mut map = self.inner.lock().expect("flight table poisoned");
            match map.entry(key) {
                Entry::Occupied(e) => Role::Waiter(e.get().subscribe()),
                Entry::Vacant(v) => {
                    let (tx, _) = broadcast::channel(1);
                    v.insert(tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let inner = Arc::clone(&self.inner);
                let fut = work();
                let handle = tokio::spawn(async move {
                    let result = fut.await;
                    // Settle order matters: drop the entry first so anyone
                    // arriving after the broadcast re-reads storage instead
                    // of subscribing to a dead channel.
                    inner
                        .lock()
                        .expect("flight table poisoned")
                        .remove(&key);
                    let _ = tx.send(result.clone());
                    result
                });

                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        // Task panicked before settling; clean up the entry
                        // so the key is not wedged.
                        self.inner
                            .lock()
                            .expect("flight table poisoned")
                            .remove(&key);
                        Err(FlightError::Internal(format!(
                            "generation task failed: {e}"
                        )))
                    }
                }
            }
            Role::Waiter(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(FlightError::Internal(
                    "generation task dropped without a result".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_work(
        calls: Arc<AtomicUsize>,
        result: Result<u32, FlightError>,
    ) -> impl Future<Output = Result<u32, FlightError>> + Send + 'static {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_trigger_one_execution() {
        let flights: Flights<u32> = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run(key, move || counting_work(calls, Ok(42)))
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one leader runs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_error_reaches_every_waiter() {
        let flights: Flights<u32> = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run(key, move || {
                        counting_work(calls, Err(FlightError::Backend("boom".to_string())))
                    })
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, FlightError::Backend(ref m) if m == "boom"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_removed_once_settled() {
        let flights: Flights<u32> = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let result = flights
            .run(key, {
                let calls = Arc::clone(&calls);
                move || counting_work(calls, Ok(1))
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(flights.in_flight(), 0, "settled flight must be evicted");

        // A later call for the same key is a fresh flight, not a stale wait.
        let result = flights
            .run(key, {
                let calls = Arc::clone(&calls);
                move || counting_work(calls, Ok(2))
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let flights: Flights<u32> = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(
                async move { flights.run(Uuid::new_v4(), move || counting_work(calls, Ok(1))).await },
            )
        };
        let b = {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(
                async move { flights.run(Uuid::new_v4(), move || counting_work(calls, Ok(2))).await },
            )
        };

        assert_eq!(a.await.unwrap().unwrap(), 1);
        assert_eq!(b.await.unwrap().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2, "no cross-key serialization");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_disconnect_does_not_cancel_waiters() {
        let flights: Flights<u32> = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        // Leader task gets aborted mid-flight; the spawned work keeps going.
        let leader = {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flights
                    .run(key, move || counting_work(calls, Ok(7)))
                    .await
            })
        };
        // Give the leader a chance to claim the key, then add a waiter.
        tokio::task::yield_now().await;
        let waiter = {
            let flights = flights.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flights
                    .run(key, move || counting_work(calls, Ok(99)))
                    .await
            })
        };
        tokio::task::yield_now().await;
        leader.abort();

        assert_eq!(waiter.await.unwrap().unwrap(), 7, "waiter gets the leader's result");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
