//! Synthetic decoder producing a moving gradient
//!
//! **Why**: Lets the whole engine run (CLI `--test-pattern`, unit tests)
//! without a media backend. Per-frame delay simulates slow decoding; failing
//! frames exercise the skip-on-error path; counters expose how many seeks and
//! decodes the loader actually issued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::decoder::{Decoded, Decoder, SourceInfo};
use super::error::DecodeError;
use super::frame::Frame;

/// Shared decode counters (clone before handing the decoder to a session)
#[derive(Debug, Clone, Default)]
pub struct DecodeCounters {
    seeks: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
}

impl DecodeCounters {
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::Relaxed)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }
}

/// Test pattern source
#[derive(Debug)]
pub struct TestPattern {
    info: SourceInfo,
    position: usize,
    delay: Duration,
    failing: HashSet<usize>,
    counters: DecodeCounters,
}

impl TestPattern {
    pub fn new(frame_count: usize, fps: f64, width: u32, height: u32) -> Self {
        Self {
            info: SourceInfo {
                frame_count,
                fps,
                width: width.max(1),
                height: height.max(1),
            },
            position: 0,
            delay: Duration::ZERO,
            failing: HashSet::new(),
            counters: DecodeCounters::default(),
        }
    }

    /// Sleep this long per decoded frame
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Frames that fail with [`DecodeError::Corrupt`]
    pub fn with_failing(mut self, frames: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(frames);
        self
    }

    pub fn counters(&self) -> DecodeCounters {
        self.counters.clone()
    }

    fn render(&self, index: usize) -> Option<Frame> {
        let SourceInfo { width, height, .. } = self.info;
        let shift = (index % 256) as u32;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255 / width.max(1) + shift) % 256) as u8);
                pixels.push(((y * 255 / height.max(1)) % 256) as u8);
                pixels.push(shift as u8);
                pixels.push(255);
            }
        }
        Frame::from_rgba(index, width, height, pixels)
    }
}

impl Decoder for TestPattern {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn seek_to_frame(&mut self, index: usize) -> Result<(), DecodeError> {
        self.counters.seeks.fetch_add(1, Ordering::Relaxed);
        if index > self.info.frame_count {
            return Err(DecodeError::Seek(index, "past end of stream".to_string()));
        }
        self.position = index;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<Decoded, DecodeError> {
        if self.position >= self.info.frame_count {
            return Ok(Decoded::EndOfStream);
        }
        let index = self.position;
        self.position += 1;
        self.counters.decodes.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.failing.contains(&index) {
            return Err(DecodeError::Corrupt(index));
        }
        self.render(index)
            .map(Decoded::Frame)
            .ok_or(DecodeError::Corrupt(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_decode() {
        let mut src = TestPattern::new(3, 30.0, 4, 4);
        for expected in 0..3 {
            match src.decode_next().unwrap() {
                Decoded::Frame(f) => assert_eq!(f.index(), expected),
                Decoded::EndOfStream => panic!("early end"),
            }
        }
        assert!(matches!(src.decode_next().unwrap(), Decoded::EndOfStream));
        assert_eq!(src.counters().decodes(), 3);
    }

    #[test]
    fn test_seek_then_decode() {
        let mut src = TestPattern::new(100, 30.0, 4, 4);
        let counters = src.counters();
        src.seek_to_frame(42).unwrap();
        match src.decode_next().unwrap() {
            Decoded::Frame(f) => assert_eq!(f.index(), 42),
            Decoded::EndOfStream => panic!("early end"),
        }
        assert_eq!(counters.seeks(), 1);
        assert!(src.seek_to_frame(1000).is_err());
    }

    #[test]
    fn test_failing_frame_advances() {
        let mut src = TestPattern::new(3, 30.0, 4, 4).with_failing([1]);
        assert!(src.decode_next().is_ok());
        assert!(matches!(src.decode_next(), Err(DecodeError::Corrupt(1))));
        match src.decode_next().unwrap() {
            Decoded::Frame(f) => assert_eq!(f.index(), 2),
            Decoded::EndOfStream => panic!("early end"),
        }
    }
}
