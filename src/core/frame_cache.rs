//! Window-bounded frame cache
//!
//! Structure: `HashMap<usize, Arc<Frame>>` behind one mutex.
//! - O(1) lookup by frame index, lock held only for the map probe
//! - Admission checks the live window and the cursor epoch under the lock,
//!   so a frame decoded for a stale cursor can never land after a seek
//! - Eviction is window-based (see CleanupWorker), not LRU: frames are
//!   consumed in order, so recency says nothing the window doesn't
//!
//! Entry count stays in the low thousands, a single mutex is enough.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use super::frame::Frame;
use super::playhead::Playhead;
use super::window::Window;

/// Cache statistics for monitoring prefetch health
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Inserts refused because of a stale epoch or out-of-window index
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.evicted.store(0, Ordering::Relaxed);
    }
}

/// Frame cache anchored to a shared playhead
#[derive(Debug)]
pub struct FrameCache {
    frames: Mutex<HashMap<usize, Arc<Frame>>>,
    playhead: Arc<Playhead>,
    stats: CacheStats,
    /// Pixel bytes currently held
    memory: AtomicUsize,
}

impl FrameCache {
    pub fn new(playhead: Arc<Playhead>) -> Self {
        Self {
            frames: Mutex::new(HashMap::new()),
            playhead,
            stats: CacheStats::new(),
            memory: AtomicUsize::new(0),
        }
    }

    /// Insert a frame decoded under `epoch`.
    ///
    /// Discarded (returns false) when the epoch is stale or `index` lies
    /// outside the live window. Replaces an existing entry for the same index.
    pub fn insert(&self, index: usize, frame: Frame, epoch: u64) -> bool {
        let size = frame.mem();
        let mut frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());

        // Checked under the map lock: a seek that bumped the epoch before this
        // point is observed here, one after it sees the frame already inserted.
        let in_window = self
            .playhead
            .window()
            .is_some_and(|w| w.contains(index));
        if !self.playhead.is_current(epoch) || !in_window {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Rejected frame {} (epoch {} vs {}, in_window={})",
                index,
                epoch,
                self.playhead.epoch(),
                in_window
            );
            return false;
        }

        if let Some(old) = frames.insert(index, Arc::new(frame)) {
            self.free(old.mem());
        }
        self.memory.fetch_add(size, Ordering::Relaxed);
        trace!("Cached frame {} ({} bytes)", index, size);
        true
    }

    /// Get frame, `None` on miss. Records hit/miss.
    pub fn get(&self, index: usize) -> Option<Arc<Frame>> {
        let result = {
            let frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
            frames.get(&index).cloned()
        };
        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    /// Check presence without touching statistics
    pub fn contains(&self, index: usize) -> bool {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&index)
    }

    /// Remove every entry outside `window`. Returns number of frames evicted.
    ///
    /// Works on a snapshot of the keys; frames inserted concurrently are only
    /// removed if they are outside the window at the time they are checked.
    pub fn evict_outside(&self, window: Window) -> usize {
        let keys: Vec<usize> = {
            let frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
            frames.keys().copied().filter(|&k| !window.contains(k)).collect()
        };

        let mut count = 0;
        let mut freed = 0usize;
        for key in keys {
            let removed = self
                .frames
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&key);
            if let Some(frame) = removed {
                freed += frame.mem();
                count += 1;
            }
        }

        if count > 0 {
            self.free(freed);
            self.stats.evicted.fetch_add(count as u64, Ordering::Relaxed);
            debug!(
                "Evicted {} frames outside [{}..{}], {} MB freed",
                count,
                window.start,
                window.end,
                freed / 1024 / 1024
            );
        }
        count
    }

    /// Drop all frames (user reload)
    pub fn clear(&self) {
        let mut frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        let count = frames.len();
        frames.clear();
        self.memory.store(0, Ordering::Relaxed);
        debug!("Cleared frame cache ({} frames)", count);
    }

    /// Drop all frames and bump the epoch under the map lock.
    ///
    /// Nothing decoded before the call can land afterwards. Returns the new epoch.
    pub fn invalidate(&self) -> u64 {
        let mut frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        let epoch = self.playhead.bump_epoch();
        let count = frames.len();
        frames.clear();
        self.memory.store(0, Ordering::Relaxed);
        debug!("Invalidated frame cache ({} frames), epoch {}", count, epoch);
        epoch
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached indices, ascending
    pub fn keys(&self) -> Vec<usize> {
        let mut keys: Vec<usize> = self
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Pixel bytes held
    pub fn mem(&self) -> usize {
        self.memory.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn playhead(&self) -> &Arc<Playhead> {
        &self.playhead
    }

    fn free(&self, bytes: usize) {
        // Saturating: clear() may race with a late eviction
        let _ = self
            .memory
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(cur.saturating_sub(bytes))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decoder::SourceInfo;
    use crate::core::window::WindowBounds;

    fn make_frame(index: usize) -> Frame {
        Frame::from_rgba(index, 4, 4, vec![0u8; 64]).unwrap()
    }

    fn setup(below: f64, above: f64) -> (Arc<Playhead>, FrameCache) {
        let info = SourceInfo {
            frame_count: 300,
            fps: 30.0,
            width: 4,
            height: 4,
        };
        let playhead = Arc::new(Playhead::new(info, WindowBounds::new(below, above, 31.0)));
        let cache = FrameCache::new(Arc::clone(&playhead));
        (playhead, cache)
    }

    #[test]
    fn test_cache_basic_operations() {
        let (_ph, cache) = setup(5.0, 10.0);
        assert!(cache.insert(0, make_frame(0), 0));
        assert!(cache.contains(0));
        assert_eq!(cache.get(0).map(|f| f.index()), Some(0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.mem(), 64);
    }

    #[test]
    fn test_insert_outside_window_rejected() {
        let (ph, cache) = setup(1.0, 2.0);
        ph.publish(100);
        // Window is [70, 160]
        assert!(!cache.insert(69, make_frame(69), 0));
        assert!(!cache.insert(161, make_frame(161), 0));
        assert!(cache.insert(70, make_frame(70), 0));
        assert!(cache.insert(160, make_frame(160), 0));
        assert_eq!(cache.stats().rejected(), 2);
        assert_eq!(cache.keys(), vec![70, 160]);
    }

    #[test]
    fn test_insert_stale_epoch_rejected() {
        let (ph, cache) = setup(5.0, 10.0);
        let epoch = ph.epoch();
        ph.bump_epoch();
        assert!(!cache.insert(1, make_frame(1), epoch));
        assert!(cache.insert(1, make_frame(1), ph.epoch()));
    }

    #[test]
    fn test_evict_outside_keeps_window() {
        let (ph, cache) = setup(10.0, 10.0);
        ph.publish(150);
        for i in 0..300 {
            cache.insert(i, make_frame(i), 0);
        }
        assert_eq!(cache.len(), 300);

        let window = Window { start: 125, end: 200 };
        let before: Vec<usize> = cache.keys().into_iter().filter(|k| window.contains(*k)).collect();
        let evicted = cache.evict_outside(window);

        assert_eq!(evicted, 300 - 76);
        let after = cache.keys();
        assert!(after.iter().all(|k| window.contains(*k)));
        assert_eq!(after, before);
        assert_eq!(cache.mem(), 76 * 64);
        assert_eq!(cache.stats().evicted(), evicted as u64);
    }

    #[test]
    fn test_replace_does_not_leak_memory() {
        let (_ph, cache) = setup(5.0, 10.0);
        cache.insert(3, make_frame(3), 0);
        cache.insert(3, make_frame(3), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.mem(), 64);
    }

    #[test]
    fn test_clear() {
        let (_ph, cache) = setup(5.0, 10.0);
        for i in 0..10 {
            cache.insert(i, make_frame(i), 0);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.mem(), 0);
    }

    #[test]
    fn test_invalidate_rejects_earlier_work() {
        let (ph, cache) = setup(5.0, 10.0);
        let epoch = ph.epoch();
        cache.insert(0, make_frame(0), epoch);
        let new_epoch = cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(new_epoch, epoch + 1);
        assert!(!cache.insert(1, make_frame(1), epoch));
        assert!(cache.insert(1, make_frame(1), new_epoch));
    }

    #[test]
    fn test_cache_statistics() {
        let (_ph, cache) = setup(5.0, 10.0);
        let stats = cache.stats();
        cache.insert(0, make_frame(0), 0);

        let _ = cache.get(0);
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 0);

        let _ = cache.get(299);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hit_rate(), 0.5);

        // contains() is not counted
        assert!(!cache.contains(5));
        assert_eq!(stats.total(), 2);

        stats.reset();
        assert_eq!(stats.total(), 0);
    }
}
