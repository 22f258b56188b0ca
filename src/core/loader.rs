//! Background frame producer: fills the cache ahead of the cursor
//!
//! **Why**: Decoding is too slow to do on demand at presentation time, and
//! random access (seek) is much more expensive than sequential reads. The
//! loader walks forward from just behind the cursor, decoding sequentially
//! and seeking the decoder only when it has to jump.
//!
//! # Pass
//!
//! 1. Capture epoch and cursor
//! 2. Walk `cursor - 1 .. min(frame_count, cursor + lookahead)`, skipping
//!    cached frames
//! 3. Abandon immediately when the epoch moves (seek/reload) or on stop
//! 4. Completed without interruption: idle on a cancellable wait, then rescan
//!
//! A failing frame is logged and skipped; it never halts prefetching.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, trace, warn};

use super::decoder::{Decoded, Decoder};
use super::error::DecodeError;
use super::frame::Resample;
use super::frame_cache::FrameCache;
use super::playhead::Playhead;

/// How a single pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Walked the whole range under `epoch`
    Completed { epoch: u64, decoded: usize },
    /// Cursor epoch moved mid-pass
    Interrupted,
    /// Session is stopping
    Stopped,
}

pub struct FrameLoader {
    decoder: Box<dyn Decoder>,
    cache: Arc<FrameCache>,
    playhead: Arc<Playhead>,
    idle: Duration,
    resample: Resample,
    /// Index the decoder produced last; next sequential read yields +1
    last_decoded: Option<usize>,
}

impl FrameLoader {
    pub fn new(
        decoder: Box<dyn Decoder>,
        cache: Arc<FrameCache>,
        idle: Duration,
        resample: Resample,
    ) -> Self {
        let playhead = Arc::clone(cache.playhead());
        Self {
            decoder,
            cache,
            playhead,
            idle,
            resample,
            last_decoded: None,
        }
    }

    /// Run on a dedicated thread until the playhead is stopped
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("framecue-loader".to_string())
            .spawn(move || self.run())
    }

    /// Loader loop. Returns when stop is requested.
    pub fn run(mut self) {
        info!(
            "FrameLoader started: {} frames @ {:.3} fps",
            self.playhead.info().frame_count,
            self.playhead.info().fps
        );

        while !self.playhead.is_stopping() {
            match self.run_pass() {
                PassOutcome::Completed { epoch, decoded } => {
                    // Window is warm: sleep until a seek/stop or the idle timeout
                    if self.playhead.is_current(epoch) {
                        if decoded > 0 {
                            trace!("Loader pass done ({} decoded), idling", decoded);
                        }
                        self.playhead.wait_loader(self.idle);
                    }
                }
                PassOutcome::Interrupted => {
                    debug!("Loader pass interrupted by cursor change");
                }
                PassOutcome::Stopped => break,
            }
        }

        info!("FrameLoader stopped");
    }

    /// One sweep over the lookahead range at the current cursor
    pub fn run_pass(&mut self) -> PassOutcome {
        // Drain before capturing the epoch: any bump after this point re-signals
        self.playhead.clear_loader_wake();
        let epoch = self.playhead.epoch();
        let cursor = self.playhead.cursor();

        let frame_count = self.playhead.info().frame_count;
        let orig = cursor.saturating_sub(1);
        let top = frame_count.min(cursor + self.playhead.lookahead_frames());

        let mut decoded = 0;
        for index in orig..top {
            if self.playhead.is_stopping() {
                return PassOutcome::Stopped;
            }
            if !self.playhead.is_current(epoch) {
                return PassOutcome::Interrupted;
            }
            if self.cache.contains(index) {
                continue;
            }

            match self.load_frame(index, epoch) {
                Ok(true) => decoded += 1,
                Ok(false) => {
                    debug!("Loader hit end of stream at frame {}", index);
                    break;
                }
                Err(e) => warn!("Skipping frame {}: {}", index, e),
            }
        }

        PassOutcome::Completed { epoch, decoded }
    }

    /// Decode `index` into the cache. `Ok(false)` on end of stream.
    fn load_frame(&mut self, index: usize, epoch: u64) -> Result<bool, DecodeError> {
        if self.last_decoded.map(|last| last + 1) != Some(index) {
            debug!("Loader seek: {:?} => {}", self.last_decoded, index);
            if let Err(e) = self.decoder.seek_to_frame(index) {
                self.last_decoded = None;
                return Err(e);
            }
        }
        // The decoder moves past `index` even if the frame turns out broken
        self.last_decoded = Some(index);

        match self.decoder.decode_next()? {
            Decoded::Frame(frame) => {
                let frame = match self.playhead.target_size() {
                    Some((w, h)) => frame.resized(w, h, self.resample),
                    None => frame,
                };
                self.cache.insert(index, frame, epoch);
                Ok(true)
            }
            Decoded::EndOfStream => {
                self.last_decoded = None;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_pattern::TestPattern;
    use crate::core::window::WindowBounds;
    use std::time::Instant;

    fn setup(source: &TestPattern, below: f64, above: f64) -> (Arc<Playhead>, Arc<FrameCache>) {
        let playhead = Arc::new(Playhead::new(
            source.info(),
            WindowBounds::new(below, above, 31.0),
        ));
        let cache = Arc::new(FrameCache::new(Arc::clone(&playhead)));
        (playhead, cache)
    }

    fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_single_pass_fills_lookahead() {
        let source = TestPattern::new(300, 30.0, 4, 4);
        let counters = source.counters();
        let (playhead, cache) = setup(&source, 1.0, 2.0);
        let mut loader = FrameLoader::new(
            Box::new(source),
            Arc::clone(&cache),
            Duration::from_millis(10),
            Resample::Nearest,
        );

        let outcome = loader.run_pass();
        assert_eq!(outcome, PassOutcome::Completed { epoch: 0, decoded: 60 });
        assert_eq!(cache.keys(), (0..60).collect::<Vec<_>>());
        // Sequential: a single initial seek
        assert_eq!(counters.seeks(), 1);

        // Second pass at the same cursor decodes nothing
        let outcome = loader.run_pass();
        assert_eq!(outcome, PassOutcome::Completed { epoch: 0, decoded: 0 });
        assert_eq!(counters.decodes(), 60);
        drop(playhead);
    }

    #[test]
    fn test_pass_starts_one_behind_cursor() {
        let source = TestPattern::new(300, 30.0, 4, 4);
        let (playhead, cache) = setup(&source, 1.0, 1.0);
        playhead.publish(100);
        let mut loader =
            FrameLoader::new(Box::new(source), Arc::clone(&cache), Duration::ZERO, Resample::Nearest);

        loader.run_pass();
        assert_eq!(cache.keys(), (99..130).collect::<Vec<_>>());
    }

    #[test]
    fn test_skips_cached_with_one_seek_per_gap() {
        let source = TestPattern::new(300, 30.0, 4, 4);
        let counters = source.counters();
        let (playhead, cache) = setup(&source, 1.0, 1.0);
        for i in 10..20 {
            let frame = crate::core::frame::Frame::from_rgba(i, 4, 4, vec![0u8; 64]).unwrap();
            cache.insert(i, frame, playhead.epoch());
        }
        let mut loader =
            FrameLoader::new(Box::new(source), Arc::clone(&cache), Duration::ZERO, Resample::Nearest);

        loader.run_pass();
        assert_eq!(cache.keys(), (0..30).collect::<Vec<_>>());
        // Initial seek to 0, then a jump over the cached 10..20
        assert_eq!(counters.seeks(), 2);
        assert_eq!(counters.decodes(), 20);
    }

    #[test]
    fn test_decode_error_is_skipped() {
        let source = TestPattern::new(300, 30.0, 4, 4).with_failing([5, 6]);
        let (_playhead, cache) = setup(&source, 1.0, 1.0);
        let mut loader =
            FrameLoader::new(Box::new(source), Arc::clone(&cache), Duration::ZERO, Resample::Nearest);

        loader.run_pass();
        let keys = cache.keys();
        assert!(!keys.contains(&5));
        assert!(!keys.contains(&6));
        assert_eq!(keys.len(), 28);
        assert!(keys.contains(&29));
    }

    #[test]
    fn test_frames_after_decode_error_keep_their_index() {
        let source = TestPattern::new(300, 30.0, 4, 4).with_failing([3]);
        let counters = source.counters();
        let (_playhead, cache) = setup(&source, 1.0, 1.0);
        let mut loader =
            FrameLoader::new(Box::new(source), Arc::clone(&cache), Duration::ZERO, Resample::Nearest);

        loader.run_pass();
        // No reseek after the broken frame: decoding continues in sequence
        assert_eq!(counters.seeks(), 1);
        for key in cache.keys() {
            assert_eq!(cache.get(key).map(|f| f.index()), Some(key));
        }
    }

    #[test]
    fn test_frames_fitted_to_target_size() {
        let source = TestPattern::new(30, 30.0, 16, 8);
        let (playhead, cache) = setup(&source, 1.0, 1.0);
        playhead.set_target_size(Some((8, 4)));
        let mut loader =
            FrameLoader::new(Box::new(source), Arc::clone(&cache), Duration::ZERO, Resample::Bilinear);

        loader.run_pass();
        assert_eq!(cache.get(3).map(|f| f.size()), Some((8, 4)));
    }

    #[test]
    fn test_loader_liveness() {
        let source = TestPattern::new(300, 30.0, 4, 4);
        let (playhead, cache) = setup(&source, 1.0, 2.0);
        playhead.publish(40);
        let handle = FrameLoader::new(
            Box::new(source),
            Arc::clone(&cache),
            Duration::from_millis(20),
            Resample::Nearest,
        )
        .spawn()
        .unwrap();

        // One behind the cursor through cursor + 2s - 1
        let filled = wait_for(Duration::from_secs(2), || (39..100).all(|i| cache.contains(i)));
        playhead.request_stop();
        handle.join().unwrap();
        assert!(filled, "lookahead not filled: {:?}", cache.keys());
    }

    #[test]
    fn test_seek_cancels_stale_work() {
        // Slow decoder, window covers the whole source so only the epoch guards inserts
        let source = TestPattern::new(300, 30.0, 4, 4).with_delay(Duration::from_millis(3));
        let (playhead, cache) = setup(&source, 10.0, 10.0);
        let handle = FrameLoader::new(
            Box::new(source),
            Arc::clone(&cache),
            Duration::from_millis(20),
            Resample::Nearest,
        )
        .spawn()
        .unwrap();

        assert!(wait_for(Duration::from_secs(2), || cache.len() >= 5));

        // Seek far ahead
        playhead.publish(200);
        playhead.bump_epoch();
        let before: Vec<usize> = cache.keys().into_iter().filter(|&k| k < 199).collect();

        // New pass starts at 199 and works forward
        assert!(wait_for(Duration::from_secs(2), || cache.contains(210)));
        let after: Vec<usize> = cache.keys().into_iter().filter(|&k| k < 199).collect();

        playhead.request_stop();
        handle.join().unwrap();

        assert_eq!(before, after, "frames inserted under a stale epoch");
        assert!(before.len() < 199);
    }

    #[test]
    fn test_stop_interrupts_idle_wait() {
        let source = TestPattern::new(10, 30.0, 4, 4);
        let (playhead, cache) = setup(&source, 1.0, 1.0);
        let handle = FrameLoader::new(
            Box::new(source),
            Arc::clone(&cache),
            Duration::from_secs(30),
            Resample::Nearest,
        )
        .spawn()
        .unwrap();

        assert!(wait_for(Duration::from_secs(2), || cache.len() == 10));
        let started = Instant::now();
        playhead.request_stop();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
