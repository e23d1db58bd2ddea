//! Memoization with bounded memory
//!
//! [`MemoCache`] stores the *pending* shared future of a computation, so every
//! caller asking for the same key while it is in flight awaits the same
//! evaluation. Completed successes stay until evicted by the LRU; failures
//! are removed as soon as they resolve, and the next call retries.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::{Error, Result};

/// Canonical identity of a set of arguments
///
/// Built from the JSON form of the arguments with object keys sorted, so
/// structurally equal arguments map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key from the canonical serialisation of `args`
    pub fn new<T: Serialize + ?Sized>(args: &T) -> Result<Self> {
        let value = serde_json::to_value(args).map_err(|e| Error::CacheKey(e.to_string()))?;
        let mut out = String::new();
        write_canonical(&value, &mut out);
        Ok(Self(out))
    }

    /// Key taken verbatim
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

type SharedResult<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Entry<V> {
    generation: u64,
    future: SharedResult<V>,
}

/// LRU of shared, possibly in-flight results
pub struct MemoCache<V> {
    entries: Mutex<LruCache<CacheKey, Entry<V>>>,
    generation: AtomicU64,
}

impl<V> MemoCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the stored or in-flight result for `key`, else start `f`
    ///
    /// `f` runs under the cache lock and must only build the future.
    pub async fn get_or_insert_with<F, Fut>(&self, key: CacheKey, f: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (generation, future) = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(entry) => {
                    log::debug!("memo hit `{key}`");
                    (entry.generation, entry.future.clone())
                }
                None => {
                    log::debug!("memo miss `{key}`");
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let future = f().boxed().shared();
                    entries.put(
                        key.clone(),
                        Entry {
                            generation,
                            future: future.clone(),
                        },
                    );
                    (generation, future)
                }
            }
        };

        let result = future.await;
        if result.is_err() {
            let mut entries = self.entries.lock();
            if entries
                .peek(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                entries.pop(&key);
            }
        }
        result
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().cap()
    }
}

impl<V> fmt::Debug for MemoCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("MemoCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

/// An async function memoized by the canonical form of its arguments
pub struct Memoized<A, V, F> {
    f: F,
    cache: MemoCache<V>,
    _args: PhantomData<fn(A)>,
}

impl<A, V, F, Fut> Memoized<A, V, F>
where
    A: Serialize,
    V: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    pub fn new(f: F, capacity: NonZeroUsize) -> Self {
        Self {
            f,
            cache: MemoCache::new(capacity),
            _args: PhantomData,
        }
    }

    /// Call through the cache
    pub async fn call(&self, args: A) -> Result<V> {
        let key = CacheKey::new(&args)?;
        self.cache.get_or_insert_with(key, || (self.f)(args)).await
    }

    pub fn cache(&self) -> &MemoCache<V> {
        &self.cache
    }
}

/// Single-slot cache holding the most recent key and result
#[derive(Debug)]
pub struct OneSlot<K, V> {
    slot: Mutex<Option<(K, V)>>,
}

impl<K, V> Default for OneSlot<K, V> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<K: PartialEq, V: Clone> OneSlot<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse the stored result when `key` equals the last key, else compute
    pub fn get_or_compute(&self, key: K, f: impl FnOnce(&K) -> V) -> V {
        if let Some((last, value)) = self.slot.lock().as_ref() {
            if *last == key {
                return value.clone();
            }
        }
        let value = f(&key);
        *self.slot.lock() = Some((key, value.clone()));
        value
    }
}
