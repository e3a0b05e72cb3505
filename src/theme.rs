use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 3] = [
  Theme {
    name: "Midnight",
    bg: Color::Rgb(22, 24, 33),
    fg: Color::Rgb(220, 223, 228),
    accent: Color::Rgb(122, 162, 247),
    muted: Color::Rgb(110, 116, 135),
    border: Color::Rgb(59, 63, 82),
    highlight_fg: Color::Rgb(22, 24, 33),
    highlight_bg: Color::Rgb(122, 162, 247),
    status: Color::Rgb(224, 175, 104),
    error: Color::Rgb(247, 118, 142),
    key_fg: Color::Rgb(22, 24, 33),
    key_bg: Color::Rgb(110, 116, 135),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(247, 250, 252),
    fg: Color::Rgb(45, 55, 72),
    accent: Color::Rgb(49, 130, 206),
    muted: Color::Rgb(148, 160, 171),
    border: Color::Rgb(203, 213, 224),
    highlight_fg: Color::Rgb(247, 250, 252),
    highlight_bg: Color::Rgb(49, 130, 206),
    status: Color::Rgb(192, 86, 33),
    error: Color::Rgb(197, 48, 48),
    key_fg: Color::Rgb(247, 250, 252),
    key_bg: Color::Rgb(113, 128, 150),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    status: Color::Yellow,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_is_case_insensitive_with_fallback() {
    assert_eq!(theme_index(Some("paper")), 1);
    assert_eq!(theme_index(Some("Terminal")), 2);
    assert_eq!(theme_index(Some("missing")), 0);
    assert_eq!(theme_index(None), 0);
  }
}
