use framecue::cli::Args;
use framecue::config::{self, PathConfig};
use framecue::core::{ConsoleSink, Decoder, PresentationSink, Session, SilentAudio, TestPattern};
use framecue::settings::PlaybackSettings;
use framecue::status::StatusLine;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the status line is printed
const STATUS_INTERVAL: Duration = Duration::from_secs(1);
/// Native size of the synthetic source
const TEST_PATTERN_SIZE: (u32, u32) = (320, 180);

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = path_config.ensure_dirs() {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    init_logger(&args, &path_config)?;
    info!("framecue starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = path_config.config_file(config::SETTINGS_FILE);
    info!("Config path: {}", settings_path.display());
    let mut settings = match PlaybackSettings::load(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{:#}, using defaults", e);
            PlaybackSettings::default()
        }
    };
    apply_overrides(&mut settings, &args);
    if args.save_config {
        settings.save(&settings_path)?;
    }

    let (decoder, audio_path) = open_source(&args)?;
    let mut session_config = settings.session_config();
    session_config.start_frame = args.start_frame.unwrap_or(0);

    let sink = Arc::new(ConsoleSink::new());
    let mut session = Session::start(
        decoder,
        Box::new(SilentAudio::new()),
        audio_path.as_deref(),
        Arc::clone(&sink) as Arc<dyn PresentationSink>,
        &session_config,
    )
    .context("Failed to start playback")?;

    let total_secs = session.playhead().info().duration_secs();
    let limit = args
        .duration
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    let started = Instant::now();

    loop {
        thread::sleep(STATUS_INTERVAL);
        println!("{}", StatusLine::capture(session.scheduler(), total_secs));

        if session.is_finished() {
            info!("Playback finished");
            break;
        }
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            info!("Duration limit reached");
            break;
        }
    }

    session.shutdown();
    let stats = session.cache().stats();
    info!(
        "Presented {} frames, cache hit rate {:.1}% ({} rejected inserts)",
        sink.presented(),
        stats.hit_rate() * 100.0,
        stats.rejected()
    );
    Ok(())
}

fn init_logger(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| path_config.data_file(config::LOG_FILE));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_level.as_str()),
        )
        .format_timestamp_millis()
        .init();
    }
    Ok(())
}

fn apply_overrides(settings: &mut PlaybackSettings, args: &Args) {
    if let Some(secs) = args.lookahead {
        settings.lookahead_secs = secs;
    }
    if let Some(secs) = args.lookback {
        settings.lookback_secs = secs;
    }
    if args.width.is_some() || args.height.is_some() {
        settings.width = args.width;
        settings.height = args.height;
    }
}

/// Decoder plus the audio track to load next to it
fn open_source(args: &Args) -> Result<(Box<dyn Decoder>, Option<PathBuf>)> {
    if let Some(frames) = args.test_pattern {
        let (w, h) = TEST_PATTERN_SIZE;
        info!("Test pattern: {} frames @ {} fps", frames, args.fps);
        return Ok((Box::new(TestPattern::new(frames, args.fps, w, h)), args.audio.clone()));
    }

    let path = args.file_path.as_deref().context("No input file given")?;
    let audio = match &args.audio {
        Some(audio) => Some(audio.clone()),
        None => config::companion_audio(path, &args.audio_dir).filter(|p| {
            let found = p.exists();
            if !found {
                info!("No audio track at {}", p.display());
            }
            found
        }),
    };
    Ok((open_video(path)?, audio))
}

#[cfg(feature = "ffmpeg")]
fn open_video(path: &Path) -> Result<Box<dyn Decoder>> {
    playa_ffmpeg::init().context("Failed to initialize FFmpeg")?;
    let decoder = framecue::core::FfmpegDecoder::open(path)?;
    Ok(Box::new(decoder))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_video(path: &Path) -> Result<Box<dyn Decoder>> {
    anyhow::bail!(
        "Cannot open {}: built without the `ffmpeg` feature (use --test-pattern)",
        path.display()
    )
}
