//! Periodic evictor: trims the cache back to the window around the cursor
//!
//! The loader only adds frames and the scheduler only reads them, so without
//! this sweep everything behind the lookback would stay resident after the
//! cursor moves on. Runs every `interval` (first pass after one interval) and
//! exits promptly on stop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, trace};

use super::frame_cache::FrameCache;
use super::playhead::Playhead;

pub struct CleanupWorker {
    cache: Arc<FrameCache>,
    playhead: Arc<Playhead>,
    interval: Duration,
}

impl CleanupWorker {
    pub fn new(cache: Arc<FrameCache>, interval: Duration) -> Self {
        let playhead = Arc::clone(cache.playhead());
        Self {
            cache,
            playhead,
            interval,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("framecue-cleanup".to_string())
            .spawn(move || self.run())
    }

    pub fn run(self) {
        info!("CleanupWorker started, interval {:?}", self.interval);
        while !self.playhead.is_stopping() {
            self.playhead.wait_cleanup(self.interval);
            if self.playhead.is_stopping() {
                break;
            }
            self.sweep();
        }
        info!("CleanupWorker stopped");
    }

    /// One eviction pass at the current cursor. Returns frames evicted.
    pub fn sweep(&self) -> usize {
        let cursor = self.playhead.cursor();
        if cursor >= self.playhead.info().frame_count {
            trace!("Cleanup skipped, cursor {} out of range", cursor);
            return 0;
        }
        match self.playhead.window_at(cursor) {
            Some(window) => self.cache.evict_outside(window),
            None => 0,
        }
    }
}
