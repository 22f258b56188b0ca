//! Audio and presentation sink capabilities
//!
//! **Why**: Audio output and pixel painting are external. The scheduler only
//! drives them: audio follows the video clock through periodic `seek_to`
//! (seeking audio is cheap, re-timing video is not), and frames are handed to
//! the presentation sink one at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use log::{debug, info};

use super::frame::Frame;

/// Independently playing audio track.
///
/// Called from the scheduler under its state lock, so calls must return quickly.
pub trait AudioSink: Send {
    fn load(&mut self, path: &Path) -> anyhow::Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn stop(&mut self);
}

/// Paints decoded frames.
///
/// Called up to ~50 Hz from the tick thread; must not block longer than one
/// tick interval. The frame reference must not be retained after return.
pub trait PresentationSink: Send + Sync {
    fn present(&self, frame: &Frame);
}

/// Audio sink that only logs. Used when no audio backend is attached.
#[derive(Debug, Default)]
pub struct SilentAudio {
    source: Option<PathBuf>,
}

impl SilentAudio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for SilentAudio {
    fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        info!("Audio (silent): loaded {}", path.display());
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) {
        debug!("Audio (silent): play");
    }

    fn pause(&mut self) {
        debug!("Audio (silent): pause");
    }

    fn resume(&mut self) {
        debug!("Audio (silent): resume");
    }

    fn seek_to(&mut self, seconds: f64) {
        log::trace!("Audio (silent): seek to {:.3}s", seconds);
    }

    fn stop(&mut self) {
        if let Some(path) = self.source.take() {
            debug!("Audio (silent): stop {}", path.display());
        }
    }
}

/// Presentation sink that records what was shown, for headless runs.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    presented: AtomicUsize,
    last_index: AtomicU64, // index + 1, 0 = nothing shown yet
    last_size: Mutex<Option<(u32, u32)>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `present` calls so far
    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::Relaxed)
    }

    /// Index of the frame shown last
    pub fn last_index(&self) -> Option<usize> {
        match self.last_index.load(Ordering::Relaxed) {
            0 => None,
            n => Some((n - 1) as usize),
        }
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        *self.last_size.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PresentationSink for ConsoleSink {
    fn present(&self, frame: &Frame) {
        self.presented.fetch_add(1, Ordering::Relaxed);
        self.last_index.store(frame.index() as u64 + 1, Ordering::Relaxed);
        *self.last_size.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame.size());
        log::trace!("Present frame {} ({}x{})", frame.index(), frame.width(), frame.height());
    }
}
