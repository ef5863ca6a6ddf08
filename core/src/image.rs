//! Image byte cache and loader.
//!
//! Decoding stays with the host; this layer only fetches and caches encoded
//! image bytes keyed by URL. The cache is an unbounded LRU trimmed by total
//! byte cost rather than entry count.

use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use tracing::{debug, trace};

use crate::callbacks::BasicHandler;
use crate::client::{NetClient, RequestTicket};
use crate::error::{Failure, Result};

/// Cached, shared image bytes.
pub type ImageBytes = Arc<Vec<u8>>;

struct CacheState {
    entries: LruCache<String, ImageBytes>,
    cost: u64,
}

/// In-memory LRU of image bytes with a byte budget.
pub struct ImageCache {
    state: Mutex<CacheState>,
    max_cost: u64,
}

impl ImageCache {
    pub fn new(max_cost: u64) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                cost: 0,
            }),
            max_cost,
        }
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    /// Bytes currently held.
    pub fn cost(&self) -> u64 {
        self.lock().cost
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `url`, marking it most recently used.
    pub fn get(&self, url: &str) -> Option<ImageBytes> {
        self.lock().entries.get(url).cloned()
    }

    /// Store `bytes` for `url`, evicting least recently used entries until
    /// the budget holds. Items larger than the whole budget are not cached.
    pub fn insert(&self, url: impl Into<String>, bytes: ImageBytes) -> bool {
        let size = bytes.len() as u64;
        if size > self.max_cost {
            trace!(size, max = self.max_cost, "image larger than cache budget");
            return false;
        }
        let mut state = self.lock();
        if let Some(old) = state.entries.put(url.into(), bytes) {
            state.cost -= old.len() as u64;
        }
        state.cost += size;
        while state.cost > self.max_cost {
            match state.entries.pop_lru() {
                Some((evicted, old)) => {
                    trace!(url = %evicted, size = old.len(), "evicted cached image");
                    state.cost -= old.len() as u64;
                }
                None => break,
            }
        }
        true
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.cost = 0;
        debug!("image cache cleared");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetches images through the facade and fills the cache.
pub struct ImageLoader {
    cache: Arc<ImageCache>,
    client: NetClient,
}

impl ImageLoader {
    pub fn new(cache: Arc<ImageCache>, client: NetClient) -> Self {
        Self { cache, client }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Load `url`. A cache hit invokes `callback` before returning and yields
    /// `Ok(None)`; a miss dispatches a GET and yields its ticket.
    pub fn load(
        &self,
        url: &str,
        callback: impl FnOnce(std::result::Result<ImageBytes, Failure>) + Send + 'static,
    ) -> Result<Option<RequestTicket>> {
        if let Some(bytes) = self.cache.get(url) {
            trace!(url, "image cache hit");
            callback(Ok(bytes));
            return Ok(None);
        }

        let cache = self.cache.clone();
        let key = url.to_string();
        let callback = Arc::new(Mutex::new(Some(callback)));
        let on_failure = callback.clone();
        let handler = BasicHandler::new()
            .on_success(move |response| {
                let bytes = Arc::new(response.data);
                cache.insert(key, bytes.clone());
                if let Some(callback) = take(&callback) {
                    callback(Ok(bytes));
                }
            })
            .on_failure(move |failure| {
                if let Some(callback) = take(&on_failure) {
                    callback(Err(failure));
                }
            });
        self.client.send_image(url, handler).map(Some)
    }
}

fn take<F>(slot: &Mutex<Option<F>>) -> Option<F> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}
