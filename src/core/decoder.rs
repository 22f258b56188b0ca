//! Decoder capability consumed by the frame loader
//!
//! **Why**: Container demux and pixel conversion live outside the playback
//! core. The loader only needs sequential decode plus an (expensive) seek.
//!
//! Implementations:
//! - [`TestPattern`](super::test_pattern::TestPattern): synthetic source, no I/O
//! - `FfmpegDecoder` (feature `ffmpeg`): real files via playa-ffmpeg

use super::error::DecodeError;
use super::frame::Frame;

/// Static properties of an opened source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub frame_count: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl SourceInfo {
    /// Total duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Result of one sequential decode step
#[derive(Debug)]
pub enum Decoded {
    Frame(Frame),
    EndOfStream,
}

/// Sequential-preferring video decoder.
///
/// `decode_next()` after `seek_to_frame(n)` yields frame `n`, then `n + 1`, ...
/// Seeking is assumed to be costly compared to sequential reads.
pub trait Decoder: Send {
    fn info(&self) -> SourceInfo;

    /// Reposition so the next decoded frame is `index`
    fn seek_to_frame(&mut self, index: usize) -> Result<(), DecodeError>;

    /// Decode the frame at the current position and advance by one.
    /// A failed frame still advances the position.
    fn decode_next(&mut self) -> Result<Decoded, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn seek_to_frame(&mut self, index: usize) -> Result<(), DecodeError> {
        (**self).seek_to_frame(index)
    }

    fn decode_next(&mut self) -> Result<Decoded, DecodeError> {
        (**self).decode_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let info = SourceInfo {
            frame_count: 300,
            fps: 30.0,
            width: 8,
            height: 8,
        };
        assert_eq!(info.duration_secs(), 10.0);

        let broken = SourceInfo { fps: 0.0, ..info };
        assert_eq!(broken.duration_secs(), 0.0);
    }
}
