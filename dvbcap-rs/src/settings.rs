//! Optional TOML settings file.
//!
//! Every value is optional; command-line arguments take precedence over the
//! file, and the file over built-in defaults.
//!
//! ```toml
//! [tools]
//! zap = "/usr/bin/dvbv5-zap"
//! tshark = "/usr/bin/tshark"
//! capture_grace_secs = 30
//!
//! [capture]
//! duration = 15
//! prefix = "Capture"
//! path = "."
//! default_pids = [8191]
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use dvbcap_channels::NULL_PID;
use serde::Deserialize;
use thiserror::Error;

use crate::tools::{DEFAULT_CAPTURE_GRACE, DEFAULT_TSHARK_PATH, DEFAULT_ZAP_PATH};

/// Looked up in the working directory when no `--settings` is given.
pub const DEFAULT_SETTINGS_FILE: &str = "dvbcap.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ToolsSection {
    pub zap: Option<PathBuf>,
    pub tshark: Option<PathBuf>,
    pub capture_grace_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CaptureSection {
    pub duration: Option<u64>,
    pub prefix: Option<String>,
    pub path: Option<PathBuf>,
    pub default_pids: Option<Vec<u16>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Load `explicit` if given, else [`DEFAULT_SETTINGS_FILE`] in `dir` when
    /// it exists, else defaults. Returns the file that was read, if any.
    pub fn discover(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<(Option<PathBuf>, Self), SettingsError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = dir.join(DEFAULT_SETTINGS_FILE);
                if !default_path.exists() {
                    return Ok((None, Self::default()));
                }
                default_path
            }
        };
        let settings = Self::load(&path)?;
        Ok((Some(path), settings))
    }

    pub fn zap_path(&self) -> PathBuf {
        self.tools
            .zap
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ZAP_PATH))
    }

    pub fn tshark_path(&self) -> PathBuf {
        self.tools
            .tshark
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TSHARK_PATH))
    }

    pub fn capture_grace(&self) -> Duration {
        self.tools
            .capture_grace_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CAPTURE_GRACE)
    }

    /// PIDs kept by `filter` when neither `--pid` nor `--skip-pid` is given.
    /// Null packets unless configured otherwise.
    pub fn default_pids(&self) -> Vec<u16> {
        self.capture
            .default_pids
            .clone()
            .unwrap_or_else(|| vec![NULL_PID])
    }
}
