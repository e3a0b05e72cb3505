//! Page addresses: `index.html` for the catalog home, `video.html?id=N` for a detail page.

use reqwest::Url;
use std::fmt;

const HOME_PAGE: &str = "index.html";
const DETAIL_PAGE: &str = "video.html";

/// Base used to resolve relative page addresses.
const ADDRESS_BASE: &str = "http://reel.invalid/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Home,
  Detail(i64),
}

impl Route {
  /// Parse an incoming address. Anything that does not name a usable detail page
  /// (unknown page, missing or zero id) redirects to `Home`.
  pub fn parse(address: &str) -> Route {
    let Ok(url) = Url::parse(ADDRESS_BASE).and_then(|base| base.join(address.trim())) else {
      return Route::Home;
    };
    let page = url.path().rsplit('/').next().unwrap_or("");
    if page != DETAIL_PAGE {
      return Route::Home;
    }
    let id = url.query_pairs().find(|(key, _)| key == "id").and_then(|(_, value)| parse_leading_int(&value));
    match id {
      Some(id) if id != 0 => Route::Detail(id),
      _ => Route::Home,
    }
  }

  /// Canonical address of this page.
  pub fn href(&self) -> String {
    match self {
      Route::Home => HOME_PAGE.to_string(),
      Route::Detail(id) => format!("{}?id={}", DETAIL_PAGE, id),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.href())
  }
}

/// Integer prefix of `s`, ignoring leading whitespace and trailing junk (`"12abc"` is 12).
fn parse_leading_int(s: &str) -> Option<i64> {
  let s = s.trim_start();
  let (sign, digits) = match s.strip_prefix('-') {
    Some(rest) => (-1, rest),
    None => (1, s.strip_prefix('+').unwrap_or(s)),
  };
  let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
  digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn home_addresses() {
    assert_eq!(Route::parse(""), Route::Home);
    assert_eq!(Route::parse("/"), Route::Home);
    assert_eq!(Route::parse("index.html"), Route::Home);
    assert_eq!(Route::parse("/site/index.html?q=cats"), Route::Home);
    assert_eq!(Route::parse("about.html"), Route::Home);
  }

  #[test]
  fn detail_addresses() {
    assert_eq!(Route::parse("video.html?id=3"), Route::Detail(3));
    assert_eq!(Route::parse("/catalog/video.html?id=42&autoplay=1"), Route::Detail(42));
    assert_eq!(Route::parse("video.html?ref=home&id=7"), Route::Detail(7));
  }

  #[test]
  fn detail_without_usable_id_redirects_home() {
    assert_eq!(Route::parse("video.html"), Route::Home);
    assert_eq!(Route::parse("video.html?id="), Route::Home);
    assert_eq!(Route::parse("video.html?id=abc"), Route::Home);
    assert_eq!(Route::parse("video.html?id=0"), Route::Home);
  }

  #[test]
  fn detail_id_uses_integer_prefix() {
    assert_eq!(Route::parse("video.html?id=12abc"), Route::Detail(12));
    assert_eq!(Route::parse("video.html?id=%205"), Route::Detail(5));
    assert_eq!(Route::parse("video.html?id=-4"), Route::Detail(-4));
  }

  #[test]
  fn href_round_trips() {
    for route in [Route::Home, Route::Detail(1), Route::Detail(987)] {
      assert_eq!(Route::parse(&route.href()), route);
    }
    assert_eq!(Route::Detail(5).to_string(), "video.html?id=5");
  }

  #[test]
  fn leading_int() {
    assert_eq!(parse_leading_int("15"), Some(15));
    assert_eq!(parse_leading_int("+15x"), Some(15));
    assert_eq!(parse_leading_int("x15"), None);
    assert_eq!(parse_leading_int(""), None);
  }
}
