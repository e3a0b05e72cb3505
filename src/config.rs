use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::catalog::CatalogShape;
use crate::constants::constants;
use crate::display::CliDisplayMode;
use crate::loader::{CacheMode, LoaderOptions, Location};

/// Persisted preferences, `<config dir>/reel/prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub source: Option<String>,
  pub shape: Option<CatalogShape>,
  pub cache_mode: Option<CacheMode>,
  pub timeout_secs: Option<u64>,
  /// Player command line; the video URL is appended as the last argument.
  pub player: Option<String>,
  pub theme_name: Option<String>,
  pub display_mode: Option<CliDisplayMode>,
}

impl Config {
  pub fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "reel").map(|dirs| dirs.config_dir().join("prefs.toml"))
  }

  pub fn load() -> Self {
    let Some(path) = Self::path() else { return Self::default() };
    let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
    match toml::from_str(&content) {
      Ok(config) => config,
      Err(e) => {
        warn!(path = %path.display(), err = %e, "ignoring unreadable prefs file");
        Self::default()
      }
    }
  }

  pub fn save(&self) {
    if let Some(path) = Self::path()
      && let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
      && let Err(e) = std::fs::write(&path, content)
    {
      warn!(path = %path.display(), err = %e, "failed to save prefs");
    }
  }
}

/// Values given on the command line; each one wins over the prefs file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub source: Option<String>,
  pub shape: Option<CatalogShape>,
  pub cache_mode: Option<CacheMode>,
  pub timeout_secs: Option<u64>,
  pub player: Option<String>,
  pub display_mode: Option<CliDisplayMode>,
}

/// Effective settings after merging defaults, prefs and command line.
#[derive(Debug, Clone)]
pub struct Settings {
  pub source: Location,
  pub loader: LoaderOptions,
  pub player: String,
  pub theme_name: Option<String>,
  pub display_mode: CliDisplayMode,
}

impl Settings {
  pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self> {
    let source_str = overrides
      .source
      .clone()
      .or_else(|| config.source.clone())
      .unwrap_or_else(|| constants().default_source.clone());
    let source: Location = source_str.parse().with_context(|| format!("Invalid catalog source '{}'", source_str))?;

    let timeout_secs = overrides.timeout_secs.or(config.timeout_secs).unwrap_or(constants().request_timeout_secs);
    let loader = LoaderOptions {
      shape: overrides.shape.or(config.shape).unwrap_or_default(),
      cache_mode: overrides.cache_mode.or(config.cache_mode).unwrap_or_default(),
      timeout: Duration::from_secs(timeout_secs.max(1)),
    };

    Ok(Self {
      source,
      loader,
      player: overrides.player.clone().or_else(|| config.player.clone()).unwrap_or_else(|| "mpv".to_string()),
      theme_name: config.theme_name.clone(),
      display_mode: overrides.display_mode.or(config.display_mode).unwrap_or(CliDisplayMode::Auto),
    })
  }
}
