//! Time-boxed cache for the formatted board context.
//!
//! The board id list is fixed for a fetcher, so the cache holds one entry.
//! Entries expire purely by age; only successful fetches are stored.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ContextCache {
    ttl: Duration,
    entry: Option<(String, Instant)>,
}

impl ContextCache {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// Returns the cached context if it is younger than the TTL.
    pub fn get(&self) -> Option<&str> {
        match &self.entry {
            Some((text, cached_at)) if cached_at.elapsed() < self.ttl => Some(text),
            _ => None,
        }
    }

    pub fn put(&mut self, text: String) {
        if self.ttl.is_zero() {
            return;
        }
        self.entry = Some((text, Instant::now()));
    }
}
