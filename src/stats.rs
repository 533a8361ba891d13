use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by all workers of a run. Increments are atomic, so no
/// update is lost however the workers interleave.
#[derive(Default)]
pub struct Counters {
    cache_hit: AtomicU64,
    cache_miss: AtomicU64,
    invalidation: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record_hit(&self) {
        self.cache_hit.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_miss(&self) {
        self.cache_miss.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_invalidation(&self) {
        self.invalidation.fetch_add(1, Ordering::Relaxed);
    }
    /// only meaningful once every worker has been joined
    pub fn snapshot(&self) -> Stats {
        Stats {
            cache_hit: self.cache_hit.load(Ordering::Relaxed),
            cache_miss: self.cache_miss.load(Ordering::Relaxed),
            invalidation: self.invalidation.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Stats {
    pub cache_hit: u64,
    pub cache_miss: u64,
    pub invalidation: u64,
}

impl Stats {
    pub fn reads(&self) -> u64 {
        self.cache_hit + self.cache_miss
    }

    pub fn hit_rate(&self) -> f64 {
        match self.reads() {
            0 => 0.0,
            n => self.cache_hit as f64 / n as f64,
        }
    }

    /// (label, count) pairs in display order
    pub fn entries(&self) -> [(&'static str, u64); 3] {
        [
            ("cache_hit", self.cache_hit),
            ("cache_miss", self.cache_miss),
            ("invalidation", self.invalidation),
        ]
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{cache_hit: {}, cache_miss: {}, invalidation: {}}}",
            self.cache_hit, self.cache_miss, self.invalidation
        )
    }
}
