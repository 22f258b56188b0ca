//! Shared playhead: published cursor, cursor epoch and worker signalling
//!
//! **Why**: Loader, cleanup and scheduler run on separate threads and only
//! need a handful of facts from each other: where the cursor is, whether it
//! jumped since they last looked (epoch), and whether the session is stopping.
//! A monotonically increasing epoch replaces "frame changed" flags: a flag can
//! be cleared before every interested reader saw it, a counter can't.
//!
//! **Used by**: PlaybackClock (bumps epoch), FrameCache (admission),
//! FrameLoader, CleanupWorker, DisplayScheduler, Session
//!
//! # Wakeups
//!
//! Each waiting worker owns a `bounded(1)` channel. Signals are sent with
//! `try_send`, so repeated seeks coalesce into one pending wakeup and senders
//! never block.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::decoder::SourceInfo;
use super::window::{Window, WindowBounds};

/// Signal pair for one waiting worker
#[derive(Debug)]
struct Wake {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Wake {
    fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    fn notify(&self) {
        // Full channel means a wakeup is already pending
        let _ = self.tx.try_send(());
    }

    /// Wait up to `timeout`. Returns true if woken by a signal.
    fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// Cursor/epoch/stop state shared by all session workers.
#[derive(Debug)]
pub struct Playhead {
    info: SourceInfo,
    bounds: WindowBounds,
    cursor: AtomicUsize,
    epoch: AtomicU64,
    stopping: AtomicBool,
    /// Target presentation size packed as `(w << 32) | h`, 0 = native
    target_size: AtomicU64,
    loader_wake: Wake,
    cleanup_wake: Wake,
}

impl Playhead {
    pub fn new(info: SourceInfo, bounds: WindowBounds) -> Self {
        Self {
            info,
            bounds,
            cursor: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
            target_size: AtomicU64::new(0),
            loader_wake: Wake::new(),
            cleanup_wake: Wake::new(),
        }
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn bounds(&self) -> &WindowBounds {
        &self.bounds
    }

    // === Cursor ===

    /// Frame currently targeted for presentation
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Publish a new cursor (scheduler only)
    pub fn publish(&self, index: usize) {
        self.cursor.store(index, Ordering::Release);
    }

    /// Live retention window at the published cursor
    pub fn window(&self) -> Option<Window> {
        self.window_at(self.cursor())
    }

    pub fn window_at(&self, cursor: usize) -> Option<Window> {
        Window::around(
            cursor,
            self.info.fps,
            self.bounds.below_secs(),
            self.bounds.above_secs(),
            self.info.frame_count,
        )
    }

    /// Lookahead expressed in frames at the current tunable
    pub fn lookahead_frames(&self) -> usize {
        (self.bounds.above_secs() * self.info.fps) as usize
    }

    // === Epoch ===

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Invalidate in-flight prefetch work and wake the loader.
    ///
    /// Call on every seek and on cache reload.
    pub fn bump_epoch(&self) -> u64 {
        let new_epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        trace!("Cursor epoch -> {}", new_epoch);
        self.loader_wake.notify();
        new_epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    // === Target size ===

    /// Size frames should be scaled to before caching, `None` = native
    pub fn target_size(&self) -> Option<(u32, u32)> {
        let packed = self.target_size.load(Ordering::Relaxed);
        if packed == 0 {
            None
        } else {
            Some(((packed >> 32) as u32, packed as u32))
        }
    }

    pub fn set_target_size(&self, size: Option<(u32, u32)>) {
        let packed = match size {
            Some((w, h)) if w > 0 && h > 0 => ((w as u64) << 32) | h as u64,
            _ => 0,
        };
        self.target_size.store(packed, Ordering::Relaxed);
    }

    // === Lifecycle ===

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Signal all workers to exit at their next loop boundary
    pub fn request_stop(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            debug!("Playhead: stop requested");
        }
        self.loader_wake.notify();
        self.cleanup_wake.notify();
    }

    /// Loader idle wait. Returns true if woken early (seek, reload or stop).
    pub fn wait_loader(&self, timeout: Duration) -> bool {
        self.loader_wake.wait(timeout)
    }

    /// Drop a wakeup left over from before the current pass
    pub fn clear_loader_wake(&self) {
        self.loader_wake.drain();
    }

    /// Cleanup interval wait. Returns true if woken by stop.
    pub fn wait_cleanup(&self, timeout: Duration) -> bool {
        self.cleanup_wake.wait(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn playhead() -> Playhead {
        let info = SourceInfo {
            frame_count: 300,
            fps: 30.0,
            width: 16,
            height: 16,
        };
        Playhead::new(info, WindowBounds::new(1.0, 2.0, 31.0))
    }

    #[test]
    fn test_epoch_increment() {
        let ph = playhead();
        assert_eq!(ph.epoch(), 0);
        assert_eq!(ph.bump_epoch(), 1);
        assert!(ph.is_current(1));
        assert!(!ph.is_current(0));
    }

    #[test]
    fn test_window_follows_cursor() {
        let ph = playhead();
        ph.publish(100);
        assert_eq!(ph.window(), Some(Window { start: 70, end: 160 }));
        assert_eq!(ph.lookahead_frames(), 60);
    }

    #[test]
    fn test_target_size_roundtrip() {
        let ph = playhead();
        assert_eq!(ph.target_size(), None);
        ph.set_target_size(Some((1280, 720)));
        assert_eq!(ph.target_size(), Some((1280, 720)));
        ph.set_target_size(None);
        assert_eq!(ph.target_size(), None);
    }

    #[test]
    fn test_seek_wakes_loader_early() {
        let ph = Arc::new(playhead());
        let waiter = Arc::clone(&ph);
        let started = Instant::now();
        let handle = thread::spawn(move || waiter.wait_loader(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        ph.bump_epoch();
        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_wakeups_coalesce() {
        let ph = playhead();
        ph.bump_epoch();
        ph.bump_epoch();
        ph.bump_epoch();
        assert!(ph.wait_loader(Duration::from_millis(1)));
        // Only one pending signal survives
        assert!(!ph.wait_loader(Duration::from_millis(1)));
    }

    #[test]
    fn test_stop_wakes_cleanup() {
        let ph = playhead();
        assert!(!ph.is_stopping());
        ph.request_stop();
        assert!(ph.is_stopping());
        assert!(ph.wait_cleanup(Duration::from_millis(1)));
    }
}
