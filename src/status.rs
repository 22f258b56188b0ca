//! One-line playback status for the console

use std::fmt;

use crate::core::{DisplayScheduler, PlaybackState};

/// Snapshot of what a status bar shows
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub frame: Option<usize>,
    pub position_secs: f64,
    pub total_secs: f64,
    pub fps: u32,
    /// Consecutive misses; non-zero shows the loading indicator
    pub stalls: u32,
    pub state: PlaybackState,
}

impl StatusLine {
    pub fn capture(scheduler: &DisplayScheduler, total_secs: f64) -> Self {
        Self {
            frame: scheduler.current_frame_index(),
            position_secs: scheduler.position().as_secs_f64(),
            total_secs,
            fps: scheduler.estimated_fps(),
            stalls: scheduler.stall_count(),
            state: scheduler.state(),
        }
    }

    /// "Loading" plus 1..=20 dots cycling with the stall count, empty when not stalled
    pub fn loading(&self) -> String {
        if self.stalls == 0 {
            String::new()
        } else {
            format!("Loading{}", ".".repeat((self.stalls % 20 + 1) as usize))
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame {
            Some(frame) => write!(f, "Frame {}", frame)?,
            None => write!(f, "Frame ---")?,
        }
        write!(
            f,
            " | {}/{} | FPS: {} | {:?}",
            format_clock(self.position_secs),
            format_clock(self.total_secs),
            self.fps,
            self.state
        )?;
        let loading = self.loading();
        if !loading.is_empty() {
            write!(f, " | {}", loading)?;
        }
        Ok(())
    }
}

/// `mm:ss`, or `h:mm:ss` from one hour up. Fractions are truncated.
pub fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (mins, secs) = (total / 60, total % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    if hours == 0 {
        format!("{:02}:{:02}", mins, secs)
    } else {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}
