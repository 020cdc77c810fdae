use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::CapacityMap;

/// Last known capacity per URL.
///
/// The cache is shared by reference between the resolver and every running
/// prober. All access goes through a single lock which is held only for the
/// duration of one map operation, never across an `.await`.
///
/// Entries are overwritten unconditionally and never removed.
#[derive(Debug, Default)]
pub struct CapacityCache {
    entries: Mutex<HashMap<String, usize>>,
}

impl CapacityCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache with room for at least `capacity` URLs
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Store `capacity` for `url`, replacing any previous estimate
    pub fn upsert(&self, url: &str, capacity: usize) {
        self.lock().insert(url.to_string(), capacity);
    }

    /// Look up the estimate for a single URL
    #[must_use]
    pub fn get(&self, url: &str) -> Option<usize> {
        self.lock().get(url).copied()
    }

    /// Look up all given URLs at once.
    ///
    /// The returned map only contains the URLs which have an estimate.
    /// Duplicates in `urls` collapse into a single entry.
    #[must_use]
    pub fn fetch_many<S: AsRef<str>>(&self, urls: &[S]) -> CapacityMap {
        let entries = self.lock();
        urls.iter()
            .filter_map(|url| {
                let url = url.as_ref();
                entries
                    .get(url)
                    .map(|capacity| (url.to_string(), *capacity))
            })
            .collect()
    }

    /// Number of URLs with an estimate
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no URL has an estimate yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Map operations never panic midway, so a poisoned map is still intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
