//! Decoded video frame (RGBA8) and presentation-size helpers
//!
//! **Why**: Frames are produced once by the loader thread and then only read.
//! The cache hands out `Arc<Frame>` so the scheduler can present a frame
//! without copying pixels and without holding the cache lock.
//!
//! **Used by**: decoders (produce), FrameCache (own), DisplayScheduler (present)

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};

/// Resampling filter used when frames are fitted to the target size.
///
/// Quality/speed trade-off, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resample {
    Nearest,
    Bilinear,
    #[default]
    Bicubic,
    Gaussian,
    Lanczos,
}

impl Resample {
    fn filter(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Bilinear => FilterType::Triangle,
            Resample::Bicubic => FilterType::CatmullRom,
            Resample::Gaussian => FilterType::Gaussian,
            Resample::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Single decoded frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: usize,
    width: u32,
    height: u32,
    pixels: Vec<u8>, // RGBA8, row-major, no padding
}

impl Frame {
    /// Build a frame from tightly packed RGBA8 pixels.
    ///
    /// Returns `None` if the buffer length does not match `width * height * 4`.
    pub fn from_rgba(index: usize, width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            index,
            width,
            height,
            pixels,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory held by pixel data (bytes)
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }

    /// Rescale to `(width, height)`. Returns self unchanged if already that size.
    pub fn resized(self, width: u32, height: u32, resample: Resample) -> Self {
        if (width, height) == self.size() || width == 0 || height == 0 {
            return self;
        }
        let (w, h) = self.size();
        let Some(src) = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(w, h, &self.pixels[..]) else {
            return self;
        };
        let out = imageops::resize(&src, width, height, resample.filter());
        Self {
            index: self.index,
            width,
            height,
            pixels: out.into_raw(),
        }
    }
}

/// Aspect-preserving size that fits `base` into the requested width and/or height.
///
/// A missing dimension does not constrain. With neither given, the native size
/// is returned.
pub fn fit_size(base: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (bw, bh) = base;
    if bw == 0 || bh == 0 {
        return base;
    }
    let xf = width.map(|w| w as f64 / bw as f64).unwrap_or(f64::INFINITY);
    let yf = height.map(|h| h as f64 / bh as f64).unwrap_or(f64::INFINITY);
    let factor = xf.min(yf);
    if !factor.is_finite() {
        return base;
    }
    let w = ((bw as f64 * factor) as u32).max(1);
    let h = ((bh as f64 * factor) as u32).max(1);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(index: usize, w: u32, h: u32) -> Frame {
        Frame::from_rgba(index, w, h, vec![200u8; (w * h * 4) as usize]).unwrap()
    }

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        assert!(Frame::from_rgba(0, 4, 4, vec![0u8; 10]).is_none());
        assert!(Frame::from_rgba(0, 4, 4, vec![0u8; 64]).is_some());
    }

    #[test]
    fn test_resized_keeps_index() {
        let frame = solid(7, 64, 32).resized(32, 16, Resample::Bilinear);
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.size(), (32, 16));
        assert_eq!(frame.mem(), 32 * 16 * 4);
    }

    #[test]
    fn test_resized_same_size_is_noop() {
        let frame = solid(1, 8, 8);
        let same = frame.clone().resized(8, 8, Resample::Lanczos);
        assert_eq!(frame, same);
    }

    #[test]
    fn test_fit_size() {
        // Width-limited
        assert_eq!(fit_size((1920, 1080), Some(960), None), (960, 540));
        // Height-limited
        assert_eq!(fit_size((640, 480), Some(1000), Some(240)), (320, 240));
        // Unconstrained
        assert_eq!(fit_size((640, 480), None, None), (640, 480));
    }
}
