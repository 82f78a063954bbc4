//! Rendered-page cache keyed by route path.
//!
//! Each route keeps one entry per variant (page parameters and viewer), so
//! revalidating a path drops every rendering of it at once. The cache holds
//! at most `capacity` renderings and evicts the least recently used.
//!
//! Renders race with writes: a page built from data read before a
//! revalidation must not be stored after it. Callers take a
//! [`PageCache::generation`] before reading and pass it to
//! [`PageCache::insert`], which drops the page if any revalidation happened
//! in between.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tb_core::traits::PathRevalidator;

pub const DEFAULT_CAPACITY: usize = 1024;

type PageKey = (String, String);

struct Pages {
    generation: u64,
    entries: LruCache<PageKey, String>,
}

pub struct PageCache {
    pages: Mutex<Pages>,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: Mutex::new(Pages { generation: 0, entries: LruCache::new(capacity) }),
        }
    }

    pub fn get(&self, path: &str, variant: &str) -> Option<String> {
        self.lock().entries.get(&(path.to_string(), variant.to_string())).cloned()
    }

    /// Current revalidation generation; take it before reading page data.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Stores a rendering unless a revalidation happened since `generation`.
    /// Returns whether the page was stored.
    pub fn insert(&self, path: &str, variant: String, html: String, generation: u64) -> bool {
        let mut pages = self.lock();
        if pages.generation != generation {
            log::debug!("dropping stale render of {}", path);
            return false;
        }
        pages.entries.put((path.to_string(), variant), html);
        true
    }

    /// Number of cached renderings across all paths.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Pages> {
        // The guarded data stays consistent even if a holder panicked.
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PathRevalidator for PageCache {
    fn revalidate_path(&self, path: &str) {
        let mut pages = self.lock();
        pages.generation += 1;

        let stale: Vec<PageKey> = pages
            .entries
            .iter()
            .filter(|((p, _), _)| p == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            pages.entries.pop(key);
        }
        if !stale.is_empty() {
            log::debug!("revalidated {}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revalidate_drops_all_variants_of_a_path() {
        let cache = PageCache::new();
        let generation = cache.generation();
        cache.insert("/", "page=1".into(), "one".into(), generation);
        cache.insert("/", "page=2".into(), "two".into(), generation);
        cache.insert("/thread/a", String::new(), "thread".into(), generation);

        cache.revalidate_path("/");

        assert_eq!(cache.get("/", "page=1"), None);
        assert_eq!(cache.get("/", "page=2"), None);
        assert_eq!(cache.get("/thread/a", ""), Some("thread".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn revalidating_unknown_path_is_harmless() {
        let cache = PageCache::new();
        cache.revalidate_path("/nowhere");
        assert!(cache.is_empty());
    }

    #[test]
    fn render_started_before_revalidation_is_not_stored() {
        let cache = PageCache::new();
        let generation = cache.generation();

        // A write lands while the page is being rendered.
        cache.revalidate_path("/thread/a");

        assert!(!cache.insert("/thread/a", String::new(), "stale".into(), generation));
        assert_eq!(cache.get("/thread/a", ""), None);

        let generation = cache.generation();
        assert!(cache.insert("/thread/a", String::new(), "fresh".into(), generation));
        assert_eq!(cache.get("/thread/a", ""), Some("fresh".to_string()));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = PageCache::with_capacity(2);
        let generation = cache.generation();
        cache.insert("/", "1".into(), "one".into(), generation);
        cache.insert("/", "2".into(), "two".into(), generation);
        assert!(cache.get("/", "1").is_some());

        cache.insert("/", "3".into(), "three".into(), generation);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("/", "2"), None);
        assert!(cache.get("/", "1").is_some());
        assert!(cache.get("/", "3").is_some());
    }
}
