//! framecue - video playback engine with frame prefetch and clock sync
//!
//! Re-exports all modules for use by the binary target.

// Core engine (clock, cache, loader, cleanup, scheduler)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod settings;
pub mod status;

// Re-export commonly used types from core
pub use crate::core::{
    AudioSink, Decoder, DisplayScheduler, Frame, FrameCache, PlaybackState, PresentationSink,
    Session, SessionConfig,
};
pub use settings::PlaybackSettings;
