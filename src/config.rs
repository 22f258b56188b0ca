//! Application paths and companion-file discovery

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "framecue.json";
/// Default log file name inside the data directory
pub const LOG_FILE: &str = "framecue.log";
/// Default directory holding extracted audio tracks
pub const DEFAULT_AUDIO_DIR: &str = "tmp";

const APP_DIR: &str = "framecue";
const CONFIG_DIR_ENV: &str = "FRAMECUE_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (FRAMECUE_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }

    /// Get path to a configuration file
    ///
    /// Priority:
    /// 1. CLI --config-dir argument
    /// 2. FRAMECUE_CONFIG_DIR environment variable
    /// 3. Local folder IF framecue.json or framecue.log exist there
    /// 4. Platform-specific config directory from dirs-next
    ///
    /// Platform paths:
    /// - Linux: ~/.config/framecue/{name}
    /// - macOS: ~/Library/Application Support/framecue/{name}
    /// - Windows: %APPDATA%\framecue\{name}
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// Get path to a data file (logs). Same priority as [`config_file`](Self::config_file),
    /// with the platform data directory as the default.
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    /// Create config and data directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        let config_dir = self.config_dir();
        let data_dir = self.data_dir();

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
        if data_dir != config_dir {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        }
        Ok(())
    }

    fn config_dir(&self) -> PathBuf {
        self.resolve(dirs_next::config_dir())
    }

    fn data_dir(&self) -> PathBuf {
        self.resolve(dirs_next::data_dir())
    }

    fn resolve(&self, platform: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(current_dir) = std::env::current_dir() {
            if has_local_files(&current_dir) {
                return current_dir;
            }
        }
        match platform {
            Some(dir) => dir.join(APP_DIR),
            None => PathBuf::from("."),
        }
    }
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

/// Extracted audio track for `video`: `<audio_dir>/<file name>_sound.mp3`
pub fn companion_audio(video: &Path, audio_dir: &Path) -> Option<PathBuf> {
    let name = video.file_name()?.to_string_lossy();
    Some(audio_dir.join(format!("{}_sound.mp3", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config.config_file("test.json"), PathBuf::from("/custom/test.json"));
        assert_eq!(config.data_file("framecue.log"), PathBuf::from("/custom/framecue.log"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_config_file_name() {
        let config = PathConfig::default();
        let path = config.config_file(SETTINGS_FILE);
        assert!(path.to_string_lossy().ends_with(SETTINGS_FILE));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = std::env::temp_dir().join(format!("framecue_dirs_{}", std::process::id()));
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        config.ensure_dirs().unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_companion_audio() {
        let path = companion_audio(Path::new("/videos/clip.mp4"), Path::new("tmp"));
        assert_eq!(path, Some(PathBuf::from("tmp/clip.mp4_sound.mp3")));
        assert_eq!(companion_audio(Path::new("/"), Path::new("tmp")), None);
    }
}
