//! Hydration lifecycle
//!
//! Every data object starts cold and loads its metadata once. Concurrent
//! callers share the in-flight load; a failed load leaves the object cold so
//! a later call can retry.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{Error, Result};

/// Something that loads its metadata before use
#[async_trait]
pub trait Hydrate: Send + Sync {
    /// Load once; later calls return immediately
    async fn hydrate(&self) -> Result<()>;

    fn is_hydrated(&self) -> bool;
}

/// Once-initialised state of a hydrate-able object
#[derive(Debug)]
pub struct Hydration<T> {
    owner: String,
    cell: OnceCell<T>,
    loading: AtomicUsize,
}

struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Loading(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T> Hydration<T> {
    /// Cold state for the object named `owner`
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            cell: OnceCell::new(),
            loading: AtomicUsize::new(0),
        }
    }

    /// State that is already hydrated, for inline data
    pub fn ready(owner: impl Into<String>, value: T) -> Self {
        Self {
            owner: owner.into(),
            cell: OnceCell::new_with(Some(value)),
            loading: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// The hydrated value, or [`Error::NotHydrated`]
    pub fn require(&self) -> Result<&T> {
        self.cell
            .get()
            .ok_or_else(|| Error::NotHydrated(self.owner.clone()))
    }

    pub fn is_hydrated(&self) -> bool {
        self.cell.initialized()
    }

    /// A load is running and nothing is stored yet
    pub fn is_loading(&self) -> bool {
        !self.is_hydrated() && self.loading.load(Ordering::SeqCst) > 0
    }

    /// Run `load` unless a value is stored or another load is in flight
    pub async fn get_or_try_init<F, Fut>(&self, load: F) -> Result<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let _loading = Loading::enter(&self.loading);
        let result = self.cell.get_or_try_init(load).await;
        if let Err(err) = &result {
            log::warn!("hydrating `{}` failed: {err}", self.owner);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_load_for_concurrent_callers() {
        let hydration = Hydration::new("coords");
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(3usize)
        };

        let (a, b) = tokio::join!(hydration.get_or_try_init(load), hydration.get_or_try_init(load));
        assert_eq!((*a.unwrap(), *b.unwrap()), (3, 3));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(hydration.is_hydrated());
        assert!(!hydration.is_loading());
    }

    #[tokio::test]
    async fn test_failed_load_stays_cold() {
        let hydration: Hydration<u8> = Hydration::new("header");
        let err = hydration
            .get_or_try_init(|| async { Err(Error::http("header.json", "status 503")) })
            .await;
        assert!(err.is_err());
        assert!(!hydration.is_hydrated());
        assert_eq!(hydration.require(), Err(Error::NotHydrated("header".into())));

        let ok = hydration.get_or_try_init(|| async { Ok(1) }).await;
        assert_eq!(ok.copied(), Ok(1));
    }
}
