//! FFmpeg video decoder (feature `ffmpeg`)
//!
//! Keeps one demuxer + decoder open for the whole session so the loader can
//! read sequentially; `seek_to_frame` jumps to the keyframe before the target
//! and drops frames until the target timestamp is reached.

use std::path::Path;
use std::sync::Once;

use log::{debug, warn};
use playa_ffmpeg as ffmpeg;

use super::decoder::{Decoded, Decoder, SourceInfo};
use super::error::{DecodeError, OpenError};
use super::frame::Frame;

static FFMPEG_LOG_INIT: Once = Once::new();

fn init_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| unsafe {
        // AV_LOG_QUIET: decoder chatter would interleave with our own log
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
    });
}

pub struct FfmpegDecoder {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_idx: usize,
    frame_tb: ffmpeg::ffi::AVRational,
    stream_tb: ffmpeg::ffi::AVRational,
    info: SourceInfo,
    /// Drop decoded frames with pts below this (set by seek)
    skip_until: Option<i64>,
    next_index: usize,
    eof_sent: bool,
    drained: bool,
}

// SAFETY: every FFmpeg handle is owned by this struct and never shared. The
// decoder is moved once into the loader thread and used only from there.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }
        init_ffmpeg_logging();

        let input = ffmpeg::format::input(path)
            .map_err(|e| OpenError::Backend(format!("Failed to open {}: {}", path.display(), e)))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| OpenError::NoVideoStream(path.to_path_buf()))?;
        let stream_idx = stream.index();

        let rate = stream.avg_frame_rate();
        let time_base = stream.time_base();
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            return Err(OpenError::InvalidSource(format!(
                "{}: unknown frame rate",
                path.display()
            )));
        }
        let fps = rate.numerator() as f64 / rate.denominator() as f64;
        let duration_secs = stream.duration() as f64 * time_base.numerator() as f64
            / time_base.denominator() as f64;
        let frame_count = if stream.frames() > 0 {
            stream.frames() as usize
        } else {
            (duration_secs * fps) as usize
        };

        let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| OpenError::Backend(format!("Failed to create decoder context: {}", e)))?;
        // Multi-threaded frame decoding
        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0;
        }
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| OpenError::Backend(format!("Failed to create video decoder: {}", e)))?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| OpenError::Backend(format!("Failed to create scaler: {}", e)))?;

        let info = SourceInfo {
            frame_count,
            fps,
            width,
            height,
        };
        debug!("Opened {}: {:?}", path.display(), info);

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_idx,
            frame_tb: ffmpeg::ffi::AVRational {
                num: rate.denominator(),
                den: rate.numerator(),
            },
            stream_tb: ffmpeg::ffi::AVRational {
                num: time_base.numerator(),
                den: time_base.denominator(),
            },
            info,
            skip_until: None,
            next_index: 0,
            eof_sent: false,
            drained: false,
        })
    }

    fn frame_to_ts(&self, index: usize) -> i64 {
        unsafe { ffmpeg::ffi::av_rescale_q(index as i64, self.frame_tb, self.stream_tb) }
    }

    /// Feed one video packet, or EOF once the demuxer is exhausted
    fn feed(&mut self) -> Result<(), DecodeError> {
        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_idx {
                continue;
            }
            return self
                .decoder
                .send_packet(&packet)
                .map_err(|e| DecodeError::Backend(format!("Failed to send packet: {}", e)));
        }
        if !self.eof_sent {
            self.eof_sent = true;
            let _ = self.decoder.send_eof();
        }
        Ok(())
    }

    /// Count a failed frame as consumed so later frames keep their index
    fn skip_failed(&mut self, e: DecodeError) -> DecodeError {
        warn!("Decode error at frame {}: {}", self.next_index, e);
        self.next_index += 1;
        e
    }

    fn to_rgba(&mut self, decoded: &ffmpeg::util::frame::video::Video) -> Result<Frame, DecodeError> {
        let index = self.next_index;
        let mut rgba = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgba)
            .map_err(|e| DecodeError::Backend(format!("Failed to scale frame {}: {}", index, e)))?;

        let (width, height) = (rgba.width(), rgba.height());
        let stride = rgba.stride(0);
        let data = rgba.data(0);
        let row_bytes = width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        Frame::from_rgba(index, width, height, pixels).ok_or(DecodeError::Corrupt(index))
    }
}

impl Decoder for FfmpegDecoder {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn seek_to_frame(&mut self, index: usize) -> Result<(), DecodeError> {
        let target_ts = self.frame_to_ts(index);
        let ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                self.stream_idx as i32,
                target_ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if ret < 0 {
            return Err(DecodeError::Seek(index, format!("av_seek_frame returned {}", ret)));
        }
        self.decoder.flush();
        self.skip_until = Some(target_ts);
        self.next_index = index;
        self.eof_sent = false;
        self.drained = false;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<Decoded, DecodeError> {
        if self.drained || self.next_index >= self.info.frame_count {
            return Ok(Decoded::EndOfStream);
        }

        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    if let (Some(target), Some(pts)) = (self.skip_until, decoded.pts()) {
                        if pts < target {
                            continue;
                        }
                    }
                    self.skip_until = None;
                    let result = self.to_rgba(&decoded);
                    self.next_index += 1;
                    return result.map(Decoded::Frame);
                }
                Err(ffmpeg::Error::Eof) => {
                    self.drained = true;
                    return Ok(Decoded::EndOfStream);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    if self.eof_sent {
                        // Flushed and still waiting: nothing more will come
                        self.drained = true;
                        return Ok(Decoded::EndOfStream);
                    }
                    if let Err(e) = self.feed() {
                        return Err(self.skip_failed(e));
                    }
                }
                Err(e) => {
                    let err = DecodeError::Backend(format!("frame {}: {}", self.next_index, e));
                    return Err(self.skip_failed(err));
                }
            }
        }
    }
}
