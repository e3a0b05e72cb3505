use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
    }
  }
}

/// Detect the best thumbnail rendering the terminal supports.
///
/// - Direct: `COLORTERM` is `truecolor` or `24bit`, or the terminal is known to be true-color
/// - Ascii: fallback
pub fn detect_display_mode() -> DisplayMode {
  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  let term = std::env::var("TERM").unwrap_or_default();
  let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();
  mode_for(&colorterm, &term, &term_program)
}

fn mode_for(colorterm: &str, term: &str, term_program: &str) -> DisplayMode {
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }
  if term == "xterm-kitty" || matches!(term_program, "kitty" | "wezterm" | "ghostty" | "iterm.app") {
    return DisplayMode::Direct;
  }
  DisplayMode::Ascii
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truecolor_terminals_get_half_blocks() {
    assert_eq!(mode_for("truecolor", "xterm-256color", ""), DisplayMode::Direct);
    assert_eq!(mode_for("24bit", "", ""), DisplayMode::Direct);
    assert_eq!(mode_for("", "xterm-kitty", ""), DisplayMode::Direct);
    assert_eq!(mode_for("", "xterm-256color", "wezterm"), DisplayMode::Direct);
  }

  #[test]
  fn unknown_terminals_fall_back_to_ascii() {
    assert_eq!(mode_for("", "xterm", ""), DisplayMode::Ascii);
    assert_eq!(mode_for("", "linux", "tmux"), DisplayMode::Ascii);
  }

  #[test]
  fn explicit_modes_are_honored() {
    assert_eq!(resolve_display_mode(CliDisplayMode::Ascii), DisplayMode::Ascii);
    assert_eq!(resolve_display_mode(CliDisplayMode::Direct), DisplayMode::Direct);
  }
}
