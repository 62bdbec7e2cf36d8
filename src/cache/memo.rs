//! In-process memoization of async computations
//!
//! Each key maps to a shared future. The first caller for a key creates it,
//! every later or concurrent caller awaits the same future, so the
//! underlying computation runs at most once per key until [`Memoizer::clear`].
//! Failures are memoized like successes.

use crate::error::{PkgcacheError, PkgcacheResult};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Outcome shared between all callers of one key
pub type MemoOutcome<V> = Result<V, Arc<PkgcacheError>>;

type SharedComputation<V> = Shared<BoxFuture<'static, MemoOutcome<V>>>;

/// Key-to-shared-future map
pub struct Memoizer<K, V> {
    entries: Mutex<HashMap<K, SharedComputation<V>>>,
}

impl<K, V> Memoizer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the memoized outcome for `key`, running `compute` only if
    /// no entry exists yet
    ///
    /// `compute` is only called when the shared future is first polled,
    /// after the lock is released, so it may use this memoizer itself.
    pub async fn get_or_create<F, Fut>(&self, key: K, compute: F) -> MemoOutcome<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PkgcacheResult<V>> + Send + 'static,
    {
        let computation = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(existing) => {
                    debug!("Memo hit for {:?}", key);
                    existing.clone()
                }
                None => {
                    let computation = future::lazy(move |_| compute())
                        .flatten()
                        .map(|result| result.map_err(Arc::new))
                        .boxed()
                        .shared();
                    entries.insert(key, computation.clone());
                    computation
                }
            }
        };

        computation.await
    }

    /// Forget every entry
    ///
    /// Callers already awaiting a computation still receive its outcome;
    /// only later calls start afresh.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        debug!("Clearing {} memoized entries", entries.len());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Default for Memoizer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
