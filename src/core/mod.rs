//! Core engine modules - clock, cache, loader, cleanup, scheduler
//!
//! These modules form the playback engine, independent of any UI or audio
//! backend. Collaborators plug in through [`Decoder`], [`AudioSink`] and
//! [`PresentationSink`].

pub mod cleanup;
pub mod clock;
pub mod decoder;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_decoder;
pub mod frame;
pub mod frame_cache;
pub mod loader;
pub mod playhead;
pub mod scheduler;
pub mod session;
pub mod sinks;
pub mod test_pattern;
pub mod window;

// Re-exports for convenience
pub use cleanup::CleanupWorker;
pub use clock::PlaybackClock;
pub use decoder::{Decoded, Decoder, SourceInfo};
pub use error::{DecodeError, OpenError};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg_decoder::FfmpegDecoder;
pub use frame::{fit_size, Frame, Resample};
pub use frame_cache::{CacheStats, FrameCache};
pub use loader::FrameLoader;
pub use playhead::Playhead;
pub use scheduler::{DisplayScheduler, PlaybackState, SchedulerConfig, Tick};
pub use session::{Session, SessionConfig};
pub use sinks::{AudioSink, ConsoleSink, PresentationSink, SilentAudio};
pub use test_pattern::{DecodeCounters, TestPattern};
pub use window::{Window, WindowBounds};
