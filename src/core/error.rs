//! Error taxonomy of the playback core
//!
//! **Why**: Only opening a source may fail a session. Everything after that is
//! either recoverable per frame ([`DecodeError`]) or a state, not an error
//! (underrun, end of stream).
//!
//! **Used by**: decoders (open + per-frame), FrameLoader (logs and skips)

use std::path::PathBuf;

/// Source could not be opened. Fatal: the session never starts.
#[derive(Debug)]
pub enum OpenError {
    NotFound(PathBuf),
    NoVideoStream(PathBuf),
    InvalidSource(String),
    Backend(String),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::NotFound(p) => write!(f, "Source not found: {}", p.display()),
            OpenError::NoVideoStream(p) => write!(f, "No video stream in {}", p.display()),
            OpenError::InvalidSource(e) => write!(f, "Invalid source: {}", e),
            OpenError::Backend(e) => write!(f, "Decoder backend error: {}", e),
        }
    }
}

impl std::error::Error for OpenError {}

/// Single frame failed to decode. Recoverable: the loader skips it.
#[derive(Debug)]
pub enum DecodeError {
    /// Frame data is damaged or unreadable
    Corrupt(usize),
    /// Decoder could not reposition to the requested frame
    Seek(usize, String),
    Backend(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Corrupt(idx) => write!(f, "Frame {} is corrupt", idx),
            DecodeError::Seek(idx, e) => write!(f, "Seek to frame {} failed: {}", idx, e),
            DecodeError::Backend(e) => write!(f, "Decode error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}
