use crate::overlay::FadeRates;
use crate::paths;
use log::{trace, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine default config directory")]
    NoConfigDir,
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Failed to write config file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Cover every display with one overlay instead of tracking individual windows
    pub fullscreen: bool,
    /// How often the window list is re-read, in milliseconds
    pub poll_interval_ms: u64,
    /// Frames per second for window overlays
    pub window_fps: u32,
    /// Frames per second for full-screen overlays
    pub fullscreen_fps: u32,
    /// Time for a new window overlay to reach full opacity, in milliseconds
    pub fade_in_ms: u64,
    /// Time for a full-screen overlay to reach full opacity, in milliseconds
    pub fullscreen_fade_in_ms: u64,
    /// Time for an overlay to fade out completely, in milliseconds
    pub fade_out_ms: u64,
    /// Minimum time between two captures of the same overlay, in milliseconds
    pub capture_interval_ms: u64,
    /// Upper bound on overlays created in one reconciliation pass
    pub max_new_overlays_per_pass: usize,
    /// Windows narrower or shorter than this are ignored
    pub min_window_size: f64,
    /// System surfaces that never get an overlay
    pub excluded_apps: Vec<String>,
    /// Applications you never want decorated
    pub blacklisted_apps: Vec<String>,
    /// After a focus, space or display change, no overlays are created for this long
    pub transition_cooldown_ms: u64,
    /// Delay before re-reconciling after a focus change
    pub focus_settle_ms: u64,
    /// Delay before re-reconciling after a space change
    pub space_settle_ms: u64,
    /// Delay before rebuilding all overlays after a display change
    pub display_settle_ms: u64,
    /// Opacity of the captured image drawn under the effect (0.0 - 1.0)
    pub texture_mix: f32,
    /// Custom SkSL effect source. The built-in effect is used when unset
    pub shader_path: Option<PathBuf>,
}

static CURRENT_CONFIG: Lazy<Arc<RwLock<Config>>> =
    Lazy::new(|| Arc::new(RwLock::new(Config::default())));

impl Config {
    pub fn default_config_path() -> Option<PathBuf> {
        paths::default_config_path()
    }

    pub fn load(config_path: Option<&Path>, save: bool) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        if !path.exists() {
            Config::default().save_to_file(&path)?;
            trace!("Created default config file at: {}", path.display());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.config_path = Some(path.clone());

        // Write back so every field shows up in the file
        if save {
            if let Err(e) = config.save_to_file(&path) {
                warn!("Failed to update config file with missing fields: {e}");
            }
        }

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to null rather than an empty mapping
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Save the config to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let header =
            "# Vaporwave Configuration File\n# This file contains your Vaporwave overlay settings.\n\n";
        let serialized_config = serde_yaml::to_string(self)?;
        let config_content = format!("{}{}", header, serialized_config);

        fs::write(path, config_content).map_err(write_error)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_fps == 0 || self.fullscreen_fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.texture_mix) {
            return Err(ConfigError::Invalid(format!(
                "texture_mix must be between 0.0 and 1.0, got {}",
                self.texture_mix
            )));
        }
        if !self.min_window_size.is_finite() {
            return Err(ConfigError::Invalid("min_window_size must be finite".into()));
        }
        Ok(())
    }

    pub fn set_config(config: Config) {
        if let Ok(mut global_config) = CURRENT_CONFIG.write() {
            *global_config = config;
        }
    }

    pub fn current() -> RwLockReadGuard<'static, Config> {
        CURRENT_CONFIG.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update<F>(f: F)
    where
        F: FnOnce(&mut Config),
    {
        if let Ok(mut config) = CURRENT_CONFIG.write() {
            f(&mut config);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Interval between two frames of one overlay in the configured mode.
    pub fn frame_interval(&self) -> Duration {
        let fps = if self.fullscreen {
            self.fullscreen_fps
        } else {
            self.window_fps
        };
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    pub fn fade_rates(&self) -> FadeRates {
        let fade_in_ms = if self.fullscreen {
            self.fullscreen_fade_in_ms
        } else {
            self.fade_in_ms
        };
        FadeRates::from_durations(
            Duration::from_millis(fade_in_ms),
            Duration::from_millis(self.fade_out_ms),
            self.frame_interval(),
        )
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn transition_cooldown(&self) -> Duration {
        Duration::from_millis(self.transition_cooldown_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn space_settle(&self) -> Duration {
        Duration::from_millis(self.space_settle_ms)
    }

    pub fn display_settle(&self) -> Duration {
        Duration::from_millis(self.display_settle_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            fullscreen: false,
            poll_interval_ms: 1000,
            window_fps: 5,
            fullscreen_fps: 30,
            fade_in_ms: 25_000,
            fullscreen_fade_in_ms: 60_000,
            fade_out_ms: 1000,
            capture_interval_ms: 500,
            max_new_overlays_per_pass: 10,
            min_window_size: 50.0,
            excluded_apps: [
                "SystemUIServer",
                "Window Server",
                "Dock",
                "Spotlight",
                "Control Center",
                "Notification Center",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blacklisted_apps: vec!["System Settings".into(), "System Preferences".into()],
            transition_cooldown_ms: 500,
            focus_settle_ms: 200,
            space_settle_ms: 400,
            display_settle_ms: 1500,
            texture_mix: 0.35,
            shader_path: None,
        }
    }
}
