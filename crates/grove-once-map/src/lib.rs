use std::borrow::Borrow;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::pin::pin;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::FxBuildHasher;
use tokio::sync::Notify;

/// Run keyed jobs at most once and share their results between concurrent callers.
///
/// Provider queries are the typical job: when several resolutions ask for the versions of the
/// same package at the same time, only the first one performs the query, and the others wait for
/// its result.
///
/// Values are cloned out of the map, so `V` is usually an `Arc` or another cheap handle.
pub struct OnceMap<K, V, S = FxBuildHasher> {
    items: DashMap<K, Value<V>, S>,
}

enum Value<V> {
    Waiting(Arc<Notify>),
    Filled(V),
}

impl<K: Eq + Hash + Clone, V: Clone, S: BuildHasher + Clone> OnceMap<K, V, S> {
    /// Create a [`OnceMap`] with the specified hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            items: DashMap::with_hasher(hasher),
        }
    }

    /// Register that you want to start a job.
    ///
    /// If this returns `true`, the caller must run the job and call [`OnceMap::done`], or every
    /// other caller waiting on `key` hangs. If it returns `false`, the job is already running or
    /// finished, and [`OnceMap::wait`] returns its result.
    pub fn register(&self, key: K) -> bool {
        match self.items.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Value::Waiting(Arc::new(Notify::new())));
                true
            }
        }
    }

    /// Submit the result of a registered job and wake up everyone waiting for it.
    pub fn done(&self, key: K, value: V) {
        if let Some(Value::Waiting(notify)) = self.items.insert(key, Value::Filled(value)) {
            notify.notify_waiters();
        }
    }

    /// Wait for the result of a registered job.
    ///
    /// Returns `None` if nobody registered `key`. Hangs if the job never calls
    /// [`OnceMap::done`].
    pub async fn wait(&self, key: &K) -> Option<V> {
        let notify = {
            let entry = self.items.get(key)?;
            match entry.value() {
                Value::Filled(value) => return Some(value.clone()),
                Value::Waiting(notify) => notify.clone(),
            }
        };

        // Register as a waiter before checking again, so a `done` in between isn't missed.
        let notification = pin!(notify.notified());
        if let Some(value) = self.get(key) {
            return Some(value);
        }
        notification.await;

        self.get(key)
    }

    /// Return the result of `key`, running `job` to compute it unless another caller already
    /// did or is doing so.
    pub async fn get_or_run<F, Fut>(&self, key: K, job: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if self.register(key.clone()) {
            let value = job().await;
            self.done(key, value.clone());
            value
        } else {
            self.wait(&key)
                .await
                .expect("registered keys are never removed")
        }
    }

    /// Return the result of a finished job, if any.
    pub fn get<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        let entry = self.items.get(key)?;
        match entry.value() {
            Value::Filled(value) => Some(value.clone()),
            Value::Waiting(_) => None,
        }
    }

    /// Whether a job for `key` was registered, finished or not.
    pub fn contains_key<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.items.contains_key(key)
    }
}

impl<K: Eq + Hash, V, S: Default + BuildHasher + Clone> Default for OnceMap<K, V, S> {
    fn default() -> Self {
        Self {
            items: DashMap::with_hasher(S::default()),
        }
    }
}
