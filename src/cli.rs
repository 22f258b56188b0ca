use clap::Parser;
use std::path::PathBuf;

// Video backend info (compile-time)
#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (test pattern only)";

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Video player with frame prefetch and clock-synced presentation
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Video file to play (requires the `ffmpeg` feature)
    #[arg(value_name = "FILE", required_unless_present = "test_pattern")]
    pub file_path: Option<PathBuf>,

    /// Play a synthetic source of N frames instead of a file
    #[arg(long = "test-pattern", value_name = "N", conflicts_with = "file_path")]
    pub test_pattern: Option<usize>,

    /// Frame rate of the test pattern
    #[arg(long = "fps", value_name = "FPS", default_value_t = 30.0)]
    pub fps: f64,

    /// Presentation width (keeps aspect ratio)
    #[arg(short = 'W', long = "width", value_name = "PX")]
    pub width: Option<u32>,

    /// Presentation height (keeps aspect ratio)
    #[arg(short = 'H', long = "height", value_name = "PX")]
    pub height: Option<u32>,

    /// Audio track (default: <audio-dir>/<file name>_sound.mp3)
    #[arg(short = 'a', long = "audio", value_name = "FILE")]
    pub audio: Option<PathBuf>,

    /// Directory holding extracted audio tracks
    #[arg(long = "audio-dir", value_name = "DIR", default_value = crate::config::DEFAULT_AUDIO_DIR)]
    pub audio_dir: PathBuf,

    /// Start frame number (0-based)
    #[arg(long = "frame", value_name = "N")]
    pub start_frame: Option<usize>,

    /// Seconds to prefetch ahead of the cursor
    #[arg(long = "lookahead", value_name = "SECS")]
    pub lookahead: Option<f64>,

    /// Seconds to keep behind the cursor
    #[arg(long = "lookback", value_name = "SECS")]
    pub lookback: Option<f64>,

    /// Stop after this many seconds of wall time
    #[arg(short = 'd', long = "duration", value_name = "SECS")]
    pub duration: Option<f64>,

    /// Enable debug logging to file (default: framecue.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Write the effective settings to framecue.json and continue
    #[arg(long = "save-config")]
    pub save_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_test_pattern() {
        let args = Args::try_parse_from([
            "framecue",
            "--test-pattern",
            "300",
            "--fps",
            "25",
            "-W",
            "640",
            "--lookahead",
            "4",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.test_pattern, Some(300));
        assert_eq!(args.fps, 25.0);
        assert_eq!(args.width, Some(640));
        assert_eq!(args.lookahead, Some(4.0));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.audio_dir, PathBuf::from("tmp"));
    }

    #[test]
    fn test_source_required() {
        assert!(Args::try_parse_from(["framecue"]).is_err());
        assert!(Args::try_parse_from(["framecue", "clip.mp4", "--test-pattern", "10"]).is_err());
    }

    #[test]
    fn test_log_flag_optional_value() {
        let args = Args::try_parse_from(["framecue", "clip.mp4", "--log"]).unwrap();
        assert_eq!(args.log_file, Some(None));
        assert_eq!(args.file_path, Some(PathBuf::from("clip.mp4")));
    }
}
