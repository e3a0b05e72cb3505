//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` and parsed once on first access.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Catalog
  pub default_source: String,
  pub request_timeout_secs: u64,

  // Views
  pub newest_count: usize,
  pub related_count: usize,

  // Thumbnails
  pub thumbnail_concurrency: usize,
  pub thumbnail_max_width: u32,
  pub thumbnail_max_height: u32,
  pub placeholder_label: String,

  // Status line
  pub error_dismiss_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; a malformed file fails the first test run.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
