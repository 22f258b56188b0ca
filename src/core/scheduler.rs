//! Display scheduler: turns clock time into presented frames
//!
//! **Why**: Presentation is a consumer that must never wait on the decoder.
//! Each tick asks the clock which frame *should* be on screen, publishes it as
//! the cursor and shows it if the loader got there first. Missing frames are
//! counted; too many in a row means the loader is behind, so playback pauses
//! briefly and resumes on its own.
//!
//! **Used by**: Session (tick thread), CLI and tests (user controls)
//!
//! # States
//!
//! - `Playing`: clock runs, every tick presents or counts a stall
//! - `Paused`: user pause
//! - `TemporarilyPaused`: stall recovery (auto-resume deadline armed) or
//!   scrub drag (restored by `temp_resume`)
//! - `Stopped`: end of stream; `seek` brings it back to `Paused`
//!
//! # Locking
//!
//! Clock, audio and state live behind one mutex so ticks and user controls
//! never interleave. `present()` is called after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use super::clock::PlaybackClock;
use super::frame::Frame;
use super::frame_cache::FrameCache;
use super::playhead::Playhead;
use super::sinks::{AudioSink, PresentationSink};

/// Number of per-interval rates averaged by [`FpsMeter`]
const FPS_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    TemporarilyPaused,
    Stopped,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Presented(usize),
    Stalled(usize),
    Idle,
    EndOfStream,
}

/// Timing knobs of the scheduler
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick: Duration,
    /// Consecutive misses before a temporary pause
    pub stall_threshold: u32,
    pub stall_resume: Duration,
    /// Audio is re-seeked to video time this often while playing
    pub audio_resync: Duration,
    /// Retry period for a one-shot presentation while not playing
    pub paused_retry: Duration,
    /// Lookahead grows while the presentation rate stays above this
    pub growth_fps: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            stall_threshold: 5,
            stall_resume: Duration::from_secs(2),
            audio_resync: Duration::from_millis(1000),
            paused_retry: Duration::from_millis(100),
            growth_fps: 25,
        }
    }
}

impl SchedulerConfig {
    fn resync_ticks(&self) -> u32 {
        let tick = self.tick.as_millis().max(1);
        ((self.audio_resync.as_millis() / tick) as u32).max(1)
    }
}

/// Rolling presentation rate: mean of the last five per-interval rates.
///
/// Starts filled with zeros, so the estimate ramps up over five presentations.
#[derive(Debug, Default)]
pub struct FpsMeter {
    samples: [u32; FPS_SAMPLES],
    next: usize,
    last: Option<Instant>,
}

impl FpsMeter {
    /// Record a presentation at `now`, returns the new estimate
    pub fn record(&mut self, now: Instant) -> u32 {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f64();
            let rate = if dt > 0.0 { (1.0 / dt).round() as u32 } else { 0 };
            self.samples[self.next] = rate;
            self.next = (self.next + 1) % FPS_SAMPLES;
        }
        self.last = Some(now);
        self.estimate()
    }

    pub fn estimate(&self) -> u32 {
        self.samples.iter().sum::<u32>() / FPS_SAMPLES as u32
    }
}

struct Inner {
    clock: PlaybackClock,
    audio: Box<dyn AudioSink>,
    state: PlaybackState,
    stalls: u32,
    fps: FpsMeter,
    ticks_since_resync: u32,
    /// Stall auto-resume deadline
    resume_at: Option<Instant>,
    /// One-shot presentation while not playing: (frame, next attempt)
    pending_show: Option<(usize, Instant)>,
    /// State to restore when a scrub drag ends
    drag_restore: Option<PlaybackState>,
}

pub struct DisplayScheduler {
    inner: Mutex<Inner>,
    cache: Arc<FrameCache>,
    playhead: Arc<Playhead>,
    sink: Arc<dyn PresentationSink>,
    config: SchedulerConfig,
}

impl DisplayScheduler {
    /// New scheduler, paused at frame 0 until [`start`](Self::start)
    pub fn new(
        cache: Arc<FrameCache>,
        audio: Box<dyn AudioSink>,
        sink: Arc<dyn PresentationSink>,
        config: SchedulerConfig,
    ) -> Self {
        let playhead = Arc::clone(cache.playhead());
        Self {
            inner: Mutex::new(Inner {
                clock: PlaybackClock::new(Arc::clone(&playhead)),
                audio,
                state: PlaybackState::Paused,
                stalls: 0,
                fps: FpsMeter::default(),
                ticks_since_resync: 0,
                resume_at: None,
                pending_show: None,
                drag_restore: None,
            }),
            cache,
            playhead,
            sink,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Tick until the playhead stops
    pub fn spawn(self: Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("framecue-tick".to_string())
            .spawn(move || {
                info!("Display tick started, every {:?}", self.config.tick);
                while !self.playhead.is_stopping() {
                    self.tick();
                    thread::sleep(self.config.tick);
                }
                info!("Display tick stopped");
            })
    }

    // === Tick ===

    pub fn tick(&self) -> Tick {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) -> Tick {
        let (frame, outcome) = {
            let mut inner = self.lock();
            let state = inner.state;
            match state {
                PlaybackState::Playing => self.tick_playing(&mut inner, now),
                PlaybackState::TemporarilyPaused
                    if inner.resume_at.is_some_and(|deadline| now >= deadline) =>
                {
                    info!("Stall timeout elapsed, resuming playback");
                    self.resume_locked(&mut inner, now);
                    (None, Tick::Idle)
                }
                _ => (self.retry_pending(&mut inner, now), Tick::Idle),
            }
        };

        if let Some(frame) = frame {
            self.sink.present(&frame);
        }
        outcome
    }

    fn tick_playing(&self, inner: &mut Inner, now: Instant) -> (Option<Arc<Frame>>, Tick) {
        let Some(index) = inner.clock.frame_index_at(now) else {
            info!("End of stream");
            inner.clock.pause_at(now);
            inner.audio.pause();
            inner.state = PlaybackState::Stopped;
            return (None, Tick::EndOfStream);
        };

        self.playhead.publish(index);

        inner.ticks_since_resync += 1;
        if inner.ticks_since_resync >= self.config.resync_ticks() {
            inner.ticks_since_resync = 0;
            let position = inner.clock.position_at(now).as_secs_f64();
            trace!("Audio resync to {:.3}s", position);
            inner.audio.seek_to(position);
        }

        match self.cache.get(index) {
            Some(frame) => {
                inner.stalls = 0;
                if inner.fps.record(now) > self.config.growth_fps {
                    self.playhead.bounds().grow_lookahead();
                }
                trace!("Present frame {}", index);
                (Some(frame), Tick::Presented(index))
            }
            None => {
                inner.stalls += 1;
                trace!("Frame {} not ready ({} in a row)", index, inner.stalls);
                if inner.stalls == self.config.stall_threshold {
                    debug!(
                        "Stalled at frame {}, pausing for {:?}",
                        index, self.config.stall_resume
                    );
                    inner.clock.pause_at(now);
                    inner.audio.pause();
                    inner.state = PlaybackState::TemporarilyPaused;
                    inner.resume_at = Some(now + self.config.stall_resume);
                }
                (None, Tick::Stalled(index))
            }
        }
    }

    /// Present the pending target once it is cached
    fn retry_pending(&self, inner: &mut Inner, now: Instant) -> Option<Arc<Frame>> {
        let (index, next_attempt) = inner.pending_show?;
        if now < next_attempt {
            return None;
        }
        self.show_or_retry(inner, index, now)
    }

    fn show_or_retry(&self, inner: &mut Inner, index: usize, now: Instant) -> Option<Arc<Frame>> {
        match self.cache.get(index) {
            Some(frame) => {
                inner.pending_show = None;
                Some(frame)
            }
            None => {
                inner.pending_show = Some((index, now + self.config.paused_retry));
                None
            }
        }
    }

    // === Transitions ===

    fn resume_locked(&self, inner: &mut Inner, now: Instant) {
        inner.clock.resume_at(now);
        inner.audio.resume();
        inner.state = PlaybackState::Playing;
        inner.stalls = 0;
        inner.resume_at = None;
        inner.pending_show = None;
    }

    fn pause_locked(&self, inner: &mut Inner, now: Instant, state: PlaybackState) {
        if inner.state == PlaybackState::Playing {
            inner.clock.pause_at(now);
            inner.audio.pause();
        }
        inner.state = state;
        inner.resume_at = None;
    }

    /// Begin playback from the current position and start the audio track
    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&self, now: Instant) {
        let mut inner = self.lock();
        if inner.state == PlaybackState::Playing {
            return;
        }
        inner.clock.resume_at(now);
        inner.audio.play();
        inner.state = PlaybackState::Playing;
        inner.stalls = 0;
        inner.resume_at = None;
        inner.pending_show = None;
        info!("Playback started at frame {:?}", inner.clock.frame_index_at(now));
    }

    /// Jump to `index` (clamped to the last frame) from any state.
    ///
    /// When not playing, the target is presented as soon as it is cached.
    pub fn seek(&self, index: usize) {
        self.seek_at(index, Instant::now());
    }

    pub fn seek_at(&self, index: usize, now: Instant) {
        let frame = {
            let mut inner = self.lock();
            self.seek_locked(&mut inner, index, now)
        };
        if let Some(frame) = frame {
            self.sink.present(&frame);
        }
    }

    fn seek_locked(&self, inner: &mut Inner, index: usize, now: Instant) -> Option<Arc<Frame>> {
        let frame_count = self.playhead.info().frame_count;
        if frame_count == 0 {
            return None;
        }
        let index = index.min(frame_count - 1);
        debug!("Seek to frame {} ({:?})", index, inner.state);

        inner.clock.seek_at(index, now);
        inner.audio.seek_to(inner.clock.position_at(now).as_secs_f64());
        inner.stalls = 0;

        if inner.state == PlaybackState::Stopped {
            inner.state = PlaybackState::Paused;
        }
        if inner.state == PlaybackState::Playing {
            inner.pending_show = None;
            None
        } else {
            self.show_or_retry(inner, index, now)
        }
    }

    /// Relative seek by `seconds`. Skipping past the end pauses instead.
    pub fn skip(&self, seconds: f64) {
        self.skip_at(seconds, Instant::now());
    }

    pub fn skip_at(&self, seconds: f64, now: Instant) {
        let frame = {
            let mut inner = self.lock();
            let info = *self.playhead.info();
            let target = inner.clock.position_at(now).as_secs_f64() + seconds;
            if target >= info.duration_secs() {
                debug!("Skip past end ({:.2}s), pausing", target);
                self.pause_locked(&mut inner, now, PlaybackState::Paused);
                return;
            }
            let index = (target.max(0.0) * info.fps).floor() as usize;
            self.seek_locked(&mut inner, index, now)
        };
        if let Some(frame) = frame {
            self.sink.present(&frame);
        }
    }

    /// Flip between Playing and Paused. A stall pause counts as paused.
    pub fn toggle_pause(&self) {
        self.toggle_pause_at(Instant::now());
    }

    pub fn toggle_pause_at(&self, now: Instant) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            PlaybackState::Playing => self.pause_locked(&mut inner, now, PlaybackState::Paused),
            PlaybackState::Paused | PlaybackState::TemporarilyPaused => {
                self.resume_locked(&mut inner, now)
            }
            PlaybackState::Stopped => debug!("Toggle ignored: stopped"),
        }
    }

    pub fn pause(&self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&self, now: Instant) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            PlaybackState::Playing | PlaybackState::TemporarilyPaused => {
                self.pause_locked(&mut inner, now, PlaybackState::Paused)
            }
            PlaybackState::Paused | PlaybackState::Stopped => {}
        }
    }

    pub fn resume(&self) {
        self.resume_at(Instant::now());
    }

    pub fn resume_at(&self, now: Instant) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            PlaybackState::Paused | PlaybackState::TemporarilyPaused => {
                self.resume_locked(&mut inner, now)
            }
            PlaybackState::Playing => {}
            PlaybackState::Stopped => debug!("Resume ignored: stopped"),
        }
    }

    /// Scrub drag started: pause, remembering whether playback was running
    pub fn temp_pause(&self) {
        self.temp_pause_at(Instant::now());
    }

    pub fn temp_pause_at(&self, now: Instant) {
        let mut inner = self.lock();
        let stalled = inner.state == PlaybackState::TemporarilyPaused && inner.resume_at.is_some();
        let restore = if stalled {
            PlaybackState::Playing
        } else {
            inner.state
        };
        inner.drag_restore = Some(restore);
        if restore == PlaybackState::Playing {
            self.pause_locked(&mut inner, now, PlaybackState::TemporarilyPaused);
        }
        trace!("Drag start, will restore {:?}", restore);
    }

    /// Scrub drag ended: restore the state `temp_pause` saw
    pub fn temp_resume(&self) {
        self.temp_resume_at(Instant::now());
    }

    pub fn temp_resume_at(&self, now: Instant) {
        let mut inner = self.lock();
        let restore = inner.drag_restore.take();
        let playing = inner.state == PlaybackState::Playing;
        match restore {
            Some(PlaybackState::Playing) if !playing => {
                self.resume_locked(&mut inner, now)
            }
            Some(_) | None => {}
        }
    }

    // === Queries ===

    pub fn current_frame_index(&self) -> Option<usize> {
        self.current_frame_index_at(Instant::now())
    }

    pub fn current_frame_index_at(&self, now: Instant) -> Option<usize> {
        self.lock().clock.frame_index_at(now)
    }

    /// Virtual media position
    pub fn position(&self) -> Duration {
        self.lock().clock.position()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    /// Consecutive ticks without a cached frame
    pub fn stall_count(&self) -> u32 {
        self.lock().stalls
    }

    pub fn estimated_fps(&self) -> u32 {
        self.lock().fps.estimate()
    }

    /// Final state after the workers exited: stop audio
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.audio.stop();
        inner.state = PlaybackState::Stopped;
        inner.pending_show = None;
        inner.resume_at = None;
    }
}
