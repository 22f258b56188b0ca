//! Persisted playback settings (`framecue.json`)
//!
//! Every field has a default, so partial or older files keep loading.
//! Durations are stored as milliseconds, window sizes as seconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::{Resample, SchedulerConfig, SessionConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    // Window
    pub lookback_secs: f64,
    pub lookahead_secs: f64,
    pub max_lookahead_secs: f64,
    pub lookahead_growth_fps: u32, // grow lookahead while presenting faster than this

    // Scheduler
    pub tick_ms: u64,
    pub stall_threshold: u32,
    pub stall_resume_ms: u64,
    pub audio_resync_ms: u64,
    pub paused_retry_ms: u64,

    // Workers
    pub cleanup_interval_ms: u64,
    pub loader_idle_ms: u64,
    pub warm_up_ms: u64,

    // Output
    pub resample: Resample,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            lookback_secs: 6.0,
            lookahead_secs: 10.0,
            max_lookahead_secs: 31.0,
            lookahead_growth_fps: 25,
            tick_ms: 20,
            stall_threshold: 5,
            stall_resume_ms: 2000,
            audio_resync_ms: 1000,
            paused_retry_ms: 100,
            cleanup_interval_ms: 2000,
            loader_idle_ms: 100,
            warm_up_ms: 200,
            resample: Resample::Bicubic,
            width: None,
            height: None,
        }
    }
}

impl PlaybackSettings {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            stall_threshold: self.stall_threshold.max(1),
            stall_resume: Duration::from_millis(self.stall_resume_ms),
            audio_resync: Duration::from_millis(self.audio_resync_ms),
            paused_retry: Duration::from_millis(self.paused_retry_ms),
            growth_fps: self.lookahead_growth_fps,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lookback_secs: self.lookback_secs,
            lookahead_secs: self.lookahead_secs,
            max_lookahead_secs: self.max_lookahead_secs,
            scheduler: self.scheduler_config(),
            cleanup_interval: Duration::from_millis(self.cleanup_interval_ms),
            loader_idle: Duration::from_millis(self.loader_idle_ms),
            warm_up: Duration::from_millis(self.warm_up_ms),
            resample: self.resample,
            target_width: self.width,
            target_height: self.height,
            start_frame: 0,
        }
    }
}
