//! Loader options
//!
//! Built from the environment ([`LoaderOptions::from_env`]) or from the
//! `[loader]` table of a TOML file:
//!
//! ```toml
//! [loader]
//! loadsize_max = 8388608
//! tmp_root = "/var/tmp"
//! load_path = ["/opt/app/lib"]
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use crate::env;

/// Default maximum size of a loadable file (4 MiB).
pub const DEFAULT_LOADSIZE_MAX: usize = 4 << 20;

/// Smallest accepted maximum load size (16 KiB).
pub const LOADSIZE_MINIMUM: usize = 16 << 10;

/// Largest accepted maximum load size (64 MiB).
pub const LOADSIZE_MAXIMUM: usize = 64 << 20;

/// Clamp a requested maximum load size into the accepted range.
pub fn clamp_loadsize(bytes: usize) -> usize {
    bytes.clamp(LOADSIZE_MINIMUM, LOADSIZE_MAXIMUM)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file is not valid TOML or has wrongly typed keys
    #[error("invalid loader configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Options for one loader instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Maximum size of a file the search driver may load
    pub loadsize_max: usize,

    /// Where native images are staged; `None` resolves from the environment
    pub tmp_root: Option<PathBuf>,

    /// Initial search roots for the search driver
    pub load_path: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            loadsize_max: DEFAULT_LOADSIZE_MAX,
            tmp_root: None,
            load_path: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    loader: LoaderOptions,
}

impl LoaderOptions {
    /// Options seeded from the process environment.
    pub fn from_env() -> Self {
        LoaderOptions {
            tmp_root: Some(env::resolve_temp_root()),
            load_path: env::initial_load_path(),
            ..Default::default()
        }
    }

    /// Parse the `[loader]` table of a TOML document.
    ///
    /// Missing keys keep their defaults; `loadsize_max` is clamped.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut options = file.loader;
        options.loadsize_max = clamp_loadsize(options.loadsize_max);
        Ok(options)
    }

    /// The staging root, falling back to the environment.
    pub fn temp_root(&self) -> PathBuf {
        self.tmp_root.clone().unwrap_or_else(env::resolve_temp_root)
    }
}
