//! Play session: one opened source with its loader, cleanup and tick threads
//!
//! **Why**: The three workers share a playhead, a cache and a decoder that
//! must outlive all of them. Session owns that wiring: it validates the
//! source, spawns the workers, gives the loader a head start, starts
//! playback, and on teardown joins every thread before audio is stopped so
//! nothing touches the decoder after it is dropped.
//!
//! **Used by**: CLI (`main.rs`), integration-style tests

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::cleanup::CleanupWorker;
use super::decoder::Decoder;
use super::error::OpenError;
use super::frame::{fit_size, Resample};
use super::frame_cache::FrameCache;
use super::loader::FrameLoader;
use super::playhead::Playhead;
use super::scheduler::{DisplayScheduler, PlaybackState, SchedulerConfig};
use super::sinks::{AudioSink, PresentationSink};
use super::window::WindowBounds;

/// Everything a session needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub lookback_secs: f64,
    pub lookahead_secs: f64,
    pub max_lookahead_secs: f64,
    pub scheduler: SchedulerConfig,
    pub cleanup_interval: Duration,
    pub loader_idle: Duration,
    /// Loader head start before the clock runs
    pub warm_up: Duration,
    pub resample: Resample,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub start_frame: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lookback_secs: 6.0,
            lookahead_secs: 10.0,
            max_lookahead_secs: 31.0,
            scheduler: SchedulerConfig::default(),
            cleanup_interval: Duration::from_secs(2),
            loader_idle: Duration::from_millis(100),
            warm_up: Duration::from_millis(200),
            resample: Resample::default(),
            target_width: None,
            target_height: None,
            start_frame: 0,
        }
    }
}

pub struct Session {
    playhead: Arc<Playhead>,
    cache: Arc<FrameCache>,
    scheduler: Arc<DisplayScheduler>,
    workers: Vec<JoinHandle<()>>,
}

impl Session {
    /// Open the pieces, spawn the workers and start playing.
    ///
    /// Fails only if the source is unusable or a thread can't be spawned.
    /// A missing or unreadable audio track is logged and playback continues
    /// without it.
    pub fn start(
        decoder: Box<dyn Decoder>,
        mut audio: Box<dyn AudioSink>,
        audio_path: Option<&Path>,
        sink: Arc<dyn PresentationSink>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let info = decoder.info();
        if info.frame_count == 0 {
            return Err(OpenError::InvalidSource("source has no frames".to_string()).into());
        }
        if info.fps.is_nan() || info.fps <= 0.0 {
            return Err(OpenError::InvalidSource(format!("bad frame rate {}", info.fps)).into());
        }
        info!(
            "Session: {} frames @ {:.3} fps, {}x{}, {:.1}s",
            info.frame_count,
            info.fps,
            info.width,
            info.height,
            info.duration_secs()
        );

        if let Some(path) = audio_path {
            if let Err(e) = audio.load(path) {
                warn!("Audio unavailable ({}): {:#}", path.display(), e);
            }
        }

        let bounds = WindowBounds::new(
            config.lookback_secs,
            config.lookahead_secs,
            config.max_lookahead_secs,
        );
        let playhead = Arc::new(Playhead::new(info, bounds));
        playhead.set_target_size(target_size(
            (info.width, info.height),
            config.target_width,
            config.target_height,
        ));

        let cache = Arc::new(FrameCache::new(Arc::clone(&playhead)));
        let scheduler = Arc::new(DisplayScheduler::new(
            Arc::clone(&cache),
            audio,
            sink,
            config.scheduler,
        ));
        if config.start_frame > 0 {
            scheduler.seek(config.start_frame);
        }

        let mut session = Self {
            playhead,
            cache,
            scheduler,
            workers: Vec::with_capacity(3),
        };

        let loader = FrameLoader::new(
            decoder,
            Arc::clone(&session.cache),
            config.loader_idle,
            config.resample,
        );
        session
            .workers
            .push(loader.spawn().context("Failed to spawn loader thread")?);

        let cleanup = CleanupWorker::new(Arc::clone(&session.cache), config.cleanup_interval);
        session
            .workers
            .push(cleanup.spawn().context("Failed to spawn cleanup thread")?);

        if !config.warm_up.is_zero() {
            debug!("Warm-up {:?}", config.warm_up);
            thread::sleep(config.warm_up);
        }

        session.scheduler.start();
        let tick = Arc::clone(&session.scheduler)
            .spawn()
            .context("Failed to spawn tick thread")?;
        session.workers.push(tick);

        Ok(session)
    }

    pub fn scheduler(&self) -> &Arc<DisplayScheduler> {
        &self.scheduler
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    pub fn playhead(&self) -> &Arc<Playhead> {
        &self.playhead
    }

    /// Drop all cached frames and restart prefetching at the cursor
    pub fn reload(&self) {
        info!("Reloading frame cache");
        self.cache.invalidate();
    }

    /// Change the presentation size; cached frames are decoded again
    pub fn resize(&self, width: Option<u32>, height: Option<u32>) {
        let info = self.playhead.info();
        let target = target_size((info.width, info.height), width, height);
        info!("Presentation size: {:?}", target);
        self.playhead.set_target_size(target);
        self.reload();
    }

    /// End of stream reached
    pub fn is_finished(&self) -> bool {
        self.scheduler.state() == PlaybackState::Stopped
    }

    /// Stop and join all workers, then stop audio. Idempotent.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.playhead.request_stop();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("Thread {} panicked", name);
            }
        }
        self.scheduler.shutdown();
        info!("Session closed ({} frames cached)", self.cache.len());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scaled size, `None` when it matches the native size
fn target_size(native: (u32, u32), width: Option<u32>, height: Option<u32>) -> Option<(u32, u32)> {
    let fitted = fit_size(native, width, height);
    (fitted != native).then_some(fitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sinks::{ConsoleSink, SilentAudio};
    use crate::core::test_pattern::TestPattern;
    use std::time::Instant;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            lookback_secs: 1.0,
            lookahead_secs: 2.0,
            scheduler: SchedulerConfig {
                tick: Duration::from_millis(10),
                ..SchedulerConfig::default()
            },
            cleanup_interval: Duration::from_millis(50),
            loader_idle: Duration::from_millis(20),
            warm_up: Duration::from_millis(100),
            ..SessionConfig::default()
        }
    }

    fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn test_target_size() {
        assert_eq!(target_size((1920, 1080), None, None), None);
        assert_eq!(target_size((1920, 1080), Some(1920), None), None);
        assert_eq!(target_size((1920, 1080), Some(960), None), Some((960, 540)));
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let result = Session::start(
            Box::new(TestPattern::new(0, 30.0, 8, 8)),
            Box::new(SilentAudio::new()),
            None,
            Arc::new(ConsoleSink::new()),
            &quick_config(),
        );
        let err = result.err().unwrap();
        assert!(err.downcast_ref::<OpenError>().is_some());
    }

    #[test]
    fn test_plays_to_end_of_stream() {
        let sink = Arc::new(ConsoleSink::new());
        let mut session = Session::start(
            Box::new(TestPattern::new(45, 30.0, 8, 8)),
            Box::new(SilentAudio::new()),
            Some(Path::new("tmp/missing_sound.mp3")),
            Arc::clone(&sink) as Arc<dyn PresentationSink>,
            &quick_config(),
        )
        .unwrap();
        assert!(session.scheduler().is_playing());

        assert!(wait_for(Duration::from_secs(6), || session.is_finished()));
        session.shutdown();

        assert!(sink.presented() > 0);
        assert!(sink.last_index().is_some_and(|i| i >= 30));
    }

    #[test]
    fn test_paused_seek_window_and_eviction() {
        // 30 fps, 300 frames, 1s back / 2s ahead
        let sink = Arc::new(ConsoleSink::new());
        let session = Session::start(
            Box::new(TestPattern::new(300, 30.0, 8, 8)),
            Box::new(SilentAudio::new()),
            None,
            Arc::clone(&sink) as Arc<dyn PresentationSink>,
            &quick_config(),
        )
        .unwrap();

        session.scheduler().pause();
        session.scheduler().seek(150);

        let cache = Arc::clone(session.cache());
        let settled = wait_for(Duration::from_secs(5), || {
            let keys = cache.keys();
            (150..200).all(|i| keys.contains(&i)) && keys.iter().all(|&k| k >= 120)
        });
        assert!(settled, "cache keys: {:?}", cache.keys());

        // Paused seek shows the target once cached
        assert!(wait_for(Duration::from_secs(2), || sink.last_index() == Some(150)));
    }

    #[test]
    fn test_resize_and_reload() {
        let session = Session::start(
            Box::new(TestPattern::new(300, 30.0, 8, 8)),
            Box::new(SilentAudio::new()),
            None,
            Arc::new(ConsoleSink::new()),
            &quick_config(),
        )
        .unwrap();
        session.scheduler().pause();
        let cursor = session.playhead().cursor();

        let epoch = session.playhead().epoch();
        session.resize(Some(4), None);
        assert!(session.playhead().epoch() > epoch);
        assert_eq!(session.playhead().target_size(), Some((4, 4)));

        let cache = Arc::clone(session.cache());
        assert!(wait_for(Duration::from_secs(3), || {
            cache.get(cursor).is_some_and(|f| f.size() == (4, 4))
        }));
    }

    #[test]
    fn test_start_frame() {
        let config = SessionConfig {
            start_frame: 120,
            ..quick_config()
        };
        let session = Session::start(
            Box::new(TestPattern::new(300, 30.0, 8, 8)),
            Box::new(SilentAudio::new()),
            None,
            Arc::new(ConsoleSink::new()),
            &config,
        )
        .unwrap();
        assert!(session.scheduler().current_frame_index().is_some_and(|i| i >= 120));
    }
}
