//! Retrieval configuration
//!
//! One [`RetrievalConfig`] is handed to a sample and shared by every source it
//! constructs.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::decompress::Decompressor;

/// Configuration for feature retrieval and caching
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Retrieved features kept per source
    pub cache_capacity: NonZeroUsize,
    /// Ad-hoc coordinate sets kept per sample
    pub coords_cache_capacity: NonZeroUsize,
    /// Decompression path for chunk payloads
    pub decompressor: Decompressor,
    /// Upper bound on displayed positions per coordinate set
    pub subsample_target: Option<usize>,
    /// Transport settings
    pub fetch: FetchConfig,
}

impl RetrievalConfig {
    const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
        Some(capacity) => capacity,
        None => NonZeroUsize::MIN,
    };
    const DEFAULT_COORDS_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(16) {
        Some(capacity) => capacity,
        None => NonZeroUsize::MIN,
    };

    /// Set the per-source feature cache capacity (zero is raised to one)
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Set the ad-hoc coordinate cache capacity (zero is raised to one)
    pub fn with_coords_cache_capacity(mut self, capacity: usize) -> Self {
        self.coords_cache_capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_decompressor(mut self, decompressor: Decompressor) -> Self {
        self.decompressor = decompressor;
        self
    }

    /// Subsample coordinate sets larger than `target` positions
    pub fn with_subsample_target(mut self, target: usize) -> Self {
        self.subsample_target = Some(target.max(1));
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            coords_cache_capacity: Self::DEFAULT_COORDS_CACHE_CAPACITY,
            decompressor: Decompressor::default(),
            subsample_target: None,
            fetch: FetchConfig::default(),
        }
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, Default)]
pub struct FetchConfig {
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// User agent sent with every request
    pub user_agent: Option<String>,
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = RetrievalConfig::default();
        assert_eq!(config.cache_capacity.get(), 64);
        assert_eq!(config.coords_cache_capacity.get(), 16);
        assert_eq!(config.subsample_target, None);

        let config = config
            .with_cache_capacity(0)
            .with_subsample_target(0)
            .with_fetch(FetchConfig::default().with_timeout(Duration::from_secs(5)));
        assert_eq!(config.cache_capacity.get(), 1);
        assert_eq!(config.subsample_target, Some(1));
        assert_eq!(config.fetch.timeout, Some(Duration::from_secs(5)));
    }
}
