//! Playback clock: wall-clock time to virtual media position
//!
//! **Why**: Presentation follows real time, not "next frame please". A slow
//! tick or a missing frame must not drift the timeline: the cursor is always
//! derived from `now - base`, so playback catches up by skipping frames.
//!
//! # Timing Model
//!
//! - Playing: `position = now - base`
//! - Paused: `position = paused_at` (frozen)
//! - Seek while playing rebases `base`; seek while paused moves `paused_at`
//! - Resume rebases `base = now - paused_at` (never resets to zero)
//!
//! Every operation has an `*_at(now)` form; the plain forms use `Instant::now()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::playhead::Playhead;

#[derive(Debug)]
pub struct PlaybackClock {
    playhead: Arc<Playhead>,
    base: Instant,
    playing: bool,
    paused_at: Duration,
}

impl PlaybackClock {
    /// New clock, paused at position zero
    pub fn new(playhead: Arc<Playhead>) -> Self {
        Self {
            playhead,
            base: Instant::now(),
            playing: false,
            paused_at: Duration::ZERO,
        }
    }

    fn fps(&self) -> f64 {
        self.playhead.info().fps
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Virtual media position
    pub fn position_at(&self, now: Instant) -> Duration {
        if self.playing {
            now.saturating_duration_since(self.base)
        } else {
            self.paused_at
        }
    }

    pub fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }

    /// Frame under the position, `None` once past the last frame
    pub fn frame_index_at(&self, now: Instant) -> Option<usize> {
        let fps = self.fps();
        if fps <= 0.0 {
            return None;
        }
        let index = (self.position_at(now).as_secs_f64() * fps).floor().max(0.0) as usize;
        (index < self.playhead.info().frame_count).then_some(index)
    }

    pub fn current_frame_index(&self) -> Option<usize> {
        self.frame_index_at(Instant::now())
    }

    /// Jump to `index`. Publishes the cursor, then bumps the epoch, so a
    /// loader woken by the bump always sees the new cursor.
    pub fn seek_at(&mut self, index: usize, now: Instant) {
        let fps = self.fps();
        let position = if fps > 0.0 {
            // Round up so floor(position * fps) lands exactly on `index`
            Duration::from_nanos((index as f64 * 1e9 / fps).ceil() as u64)
        } else {
            Duration::ZERO
        };
        self.set_position_at(position, now);
        self.playhead.publish(index);
        self.playhead.bump_epoch();
    }

    pub fn seek(&mut self, index: usize) {
        self.seek_at(index, Instant::now());
    }

    /// Move to an absolute position without touching the epoch
    fn set_position_at(&mut self, position: Duration, now: Instant) {
        if self.playing {
            match now.checked_sub(position) {
                Some(base) => self.base = base,
                None => {
                    // Instant can't reach back before its platform origin
                    log::warn!("Clock rebase underflow at {:?}, restarting from 0", position);
                    self.base = now;
                }
            }
        } else {
            self.paused_at = position;
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if !self.playing {
            return;
        }
        self.paused_at = now.saturating_duration_since(self.base);
        self.playing = false;
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn resume_at(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.set_position_at(self.paused_at, now);
    }

    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }
}
