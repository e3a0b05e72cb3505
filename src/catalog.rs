use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::LoadError;

/// One video's metadata as delivered by the catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  /// Image URL or path relative to the catalog. Empty when the document omits it.
  #[serde(default)]
  pub thumbnail: String,
  #[serde(default)]
  pub video_url: String,
  /// Free-form display string, e.g. `"12:34"`.
  #[serde(default)]
  pub duration: String,
}

impl VideoRecord {
  pub fn has_thumbnail(&self) -> bool {
    !self.thumbnail.trim().is_empty()
  }
}

/// Which top-level JSON shape the catalog document uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogShape {
  /// Detect from the document itself.
  #[default]
  Auto,
  /// `{"videos": [...]}`
  Wrapped,
  /// `[...]`
  Bare,
}

impl CatalogShape {
  pub fn label(self) -> &'static str {
    match self {
      CatalogShape::Auto => "auto",
      CatalogShape::Wrapped => "wrapped",
      CatalogShape::Bare => "bare",
    }
  }
}

#[derive(Deserialize)]
struct WrappedDocument {
  videos: Vec<VideoRecord>,
}

/// The in-memory ordered collection of records for one load. Source order is recency order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
  videos: Vec<VideoRecord>,
}

impl Catalog {
  pub fn new(videos: Vec<VideoRecord>) -> Self {
    Self { videos }
  }

  pub fn iter(&self) -> std::slice::Iter<'_, VideoRecord> {
    self.videos.iter()
  }

  pub fn len(&self) -> usize {
    self.videos.len()
  }

  pub fn is_empty(&self) -> bool {
    self.videos.is_empty()
  }

  /// First record carrying `id`.
  pub fn find(&self, id: i64) -> Option<&VideoRecord> {
    self.videos.iter().find(|v| v.id == id)
  }

  /// Ids that appear more than once, in order of their second appearance.
  pub fn duplicate_ids(&self) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(self.videos.len());
    let mut dups = Vec::new();
    for v in &self.videos {
      if !seen.insert(v.id) && !dups.contains(&v.id) {
        dups.push(v.id);
      }
    }
    dups
  }
}

impl<'a> IntoIterator for &'a Catalog {
  type Item = &'a VideoRecord;
  type IntoIter = std::slice::Iter<'a, VideoRecord>;

  fn into_iter(self) -> Self::IntoIter {
    self.videos.iter()
  }
}

/// Decide the shape of a document from its first significant byte.
fn detect_shape(bytes: &[u8]) -> CatalogShape {
  match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
    Some(b'{') => CatalogShape::Wrapped,
    _ => CatalogShape::Bare,
  }
}

/// Parse a catalog document in the requested shape, preserving source order.
pub fn parse_catalog(bytes: &[u8], shape: CatalogShape) -> Result<Catalog, LoadError> {
  let bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
  let shape = match shape {
    CatalogShape::Auto => detect_shape(bytes),
    explicit => explicit,
  };
  let videos = match shape {
    CatalogShape::Wrapped => serde_json::from_slice::<WrappedDocument>(bytes)
      .map(|doc| doc.videos)
      .map_err(|source| LoadError::Parse { expected: "{\"videos\": [...]} document", source })?,
    CatalogShape::Bare | CatalogShape::Auto => serde_json::from_slice::<Vec<VideoRecord>>(bytes)
      .map_err(|source| LoadError::Parse { expected: "video array", source })?,
  };
  Ok(Catalog::new(videos))
}

#[cfg(test)]
mod tests {
  use super::*;

  const BARE: &str = r#"[
    {"id": 1, "title": "Cats", "description": "Purring", "category": "Animals",
     "thumbnail": "thumbs/1.jpg", "videoUrl": "videos/1.mp4", "duration": "3:12"},
    {"id": 2, "title": "Dogs", "description": "Barking", "category": "Animals",
     "thumbnail": "thumbs/2.jpg", "videoUrl": "videos/2.mp4", "duration": "4:01"},
    {"id": 3, "title": "Cars", "description": "Vroom",
     "thumbnail": "", "videoUrl": "videos/3.mp4", "duration": "10:00"}
  ]"#;

  fn wrapped() -> String {
    format!(r#"{{"videos": {}}}"#, BARE)
  }

  fn ids(catalog: &Catalog) -> Vec<i64> {
    catalog.iter().map(|v| v.id).collect()
  }

  #[test]
  fn parses_bare_array_in_source_order() {
    let catalog = parse_catalog(BARE.as_bytes(), CatalogShape::Bare).unwrap();
    assert_eq!(ids(&catalog), vec![1, 2, 3]);
    assert_eq!(catalog.find(1).unwrap().video_url, "videos/1.mp4");
    assert_eq!(catalog.find(3).unwrap().category, None);
  }

  #[test]
  fn parses_wrapped_document() {
    let catalog = parse_catalog(wrapped().as_bytes(), CatalogShape::Wrapped).unwrap();
    assert_eq!(ids(&catalog), vec![1, 2, 3]);
  }

  #[test]
  fn auto_detects_both_shapes() {
    let bare = parse_catalog(BARE.as_bytes(), CatalogShape::Auto).unwrap();
    let wrapped = parse_catalog(format!("\n  {}", wrapped()).as_bytes(), CatalogShape::Auto).unwrap();
    assert_eq!(bare, wrapped);
  }

  #[test]
  fn tolerates_byte_order_mark() {
    let doc = format!("\u{feff}{}", BARE);
    assert_eq!(parse_catalog(doc.as_bytes(), CatalogShape::Auto).unwrap().len(), 3);
  }

  #[test]
  fn optional_fields_default_to_empty() {
    let doc = r#"[{"id": 7, "title": "Bare minimum"}]"#;
    let catalog = parse_catalog(doc.as_bytes(), CatalogShape::Auto).unwrap();
    let v = catalog.find(7).unwrap();
    assert_eq!(v.description, "");
    assert_eq!(v.duration, "");
    assert!(!v.has_thumbnail());
  }

  #[test]
  fn wrong_explicit_shape_is_a_parse_error() {
    let err = parse_catalog(BARE.as_bytes(), CatalogShape::Wrapped).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
    let err = parse_catalog(wrapped().as_bytes(), CatalogShape::Bare).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
  }

  #[test]
  fn missing_required_field_is_a_parse_error() {
    let doc = r#"{"videos": [{"title": "no id"}]}"#;
    assert!(matches!(parse_catalog(doc.as_bytes(), CatalogShape::Auto), Err(LoadError::Parse { .. })));
  }

  #[test]
  fn garbage_is_a_parse_error() {
    assert!(parse_catalog(b"<html>404</html>", CatalogShape::Auto).is_err());
    assert!(parse_catalog(b"", CatalogShape::Auto).is_err());
  }

  #[test]
  fn duplicate_ids_are_reported_once_and_find_returns_first() {
    let doc = r#"[
      {"id": 1, "title": "first"}, {"id": 2, "title": "x"},
      {"id": 1, "title": "second"}, {"id": 1, "title": "third"}
    ]"#;
    let catalog = parse_catalog(doc.as_bytes(), CatalogShape::Auto).unwrap();
    assert_eq!(catalog.duplicate_ids(), vec![1]);
    assert_eq!(catalog.find(1).map(|v| v.title.as_str()), Some("first"));
    assert_eq!(catalog.find(9), None);
  }
}
