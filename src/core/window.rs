//! Retention window around the cursor and its lookback/lookahead tunables
//!
//! **Why**: Cache memory is bounded by time, not by byte budget: the cache may
//! hold `lookback + lookahead` seconds of frames around the cursor and nothing
//! else. The lookahead is a single atomic tunable so the scheduler can grow it
//! while the loader and cleanup worker read it lock-free.

use std::sync::atomic::{AtomicU64, Ordering};

/// Inclusive range of frame indices the cache may retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Window around `cursor`, clamped to `[0, frame_count)`.
    ///
    /// Returns `None` for an empty source.
    pub fn around(
        cursor: usize,
        fps: f64,
        below_secs: f64,
        above_secs: f64,
        frame_count: usize,
    ) -> Option<Self> {
        if frame_count == 0 {
            return None;
        }
        let below = (below_secs * fps) as usize;
        let above = (above_secs * fps) as usize;
        let start = cursor.saturating_sub(below).min(frame_count - 1);
        let end = cursor.saturating_add(above).min(frame_count - 1);
        Some(Self { start, end })
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Lookback/lookahead seconds shared by loader, cleanup and scheduler.
///
/// Lookahead grows one second at a time up to `max_above`, and never shrinks.
#[derive(Debug)]
pub struct WindowBounds {
    below_secs: f64,
    default_above_secs: f64,
    max_above_secs: f64,
    above_bits: AtomicU64, // f64 bits
}

impl WindowBounds {
    pub fn new(below_secs: f64, above_secs: f64, max_above_secs: f64) -> Self {
        let below_secs = below_secs.max(0.0);
        let above_secs = above_secs.max(0.0);
        Self {
            below_secs,
            default_above_secs: above_secs,
            max_above_secs: max_above_secs.max(above_secs),
            above_bits: AtomicU64::new(above_secs.to_bits()),
        }
    }

    pub fn below_secs(&self) -> f64 {
        self.below_secs
    }

    pub fn above_secs(&self) -> f64 {
        f64::from_bits(self.above_bits.load(Ordering::Relaxed))
    }

    pub fn default_above_secs(&self) -> f64 {
        self.default_above_secs
    }

    /// Extend lookahead by one second, capped. Returns the new value.
    ///
    /// Single writer (scheduler tick), so a plain load/store is enough.
    pub fn grow_lookahead(&self) -> f64 {
        let current = self.above_secs();
        let next = current.max((current + 1.0).min(self.max_above_secs));
        if next != current {
            self.above_bits.store(next.to_bits(), Ordering::Relaxed);
            log::debug!("Lookahead grown: {:.1}s -> {:.1}s", current, next);
        }
        next
    }
}
