//! View selection over a loaded catalog.
//!
//! Every function here is pure: it borrows the catalog and returns the ordered
//! subsequence to display, never reordering or copying records.

use crate::catalog::{Catalog, VideoRecord};
use crate::error::NotFoundError;

/// First `n` records in catalog order, truncated (never padded).
pub fn newest(catalog: &Catalog, n: usize) -> Vec<&VideoRecord> {
  catalog.iter().take(n).collect()
}

/// Whether `record` contains the already case-folded `needle` in its title,
/// description, or category.
pub fn matches(record: &VideoRecord, needle: &str) -> bool {
  if record.title.to_lowercase().contains(needle) {
    return true;
  }
  if record.description.to_lowercase().contains(needle) {
    return true;
  }
  if let Some(ref category) = record.category
    && category.to_lowercase().contains(needle)
  {
    return true;
  }
  false
}

/// Records matching `term` case-insensitively, in catalog order.
/// A blank term selects the whole catalog.
pub fn search<'a>(catalog: &'a Catalog, term: &str) -> Vec<&'a VideoRecord> {
  let needle = term.trim().to_lowercase();
  if needle.is_empty() {
    return catalog.iter().collect();
  }
  catalog.iter().filter(|record| matches(record, &needle)).collect()
}

/// Up to `n` records sharing the category of `current_id`, excluding it, in catalog order.
///
/// Returning fewer than `n` (even zero) is correct; there is no fallback to other categories.
pub fn related(catalog: &Catalog, current_id: i64, n: usize) -> Result<Vec<&VideoRecord>, NotFoundError> {
  let current = catalog.find(current_id).ok_or(NotFoundError { id: current_id })?;
  Ok(
    catalog
      .iter()
      .filter(|record| record.id != current_id && record.category == current.category)
      .take(n)
      .collect(),
  )
}

/// How much of each record a card shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardVariant {
  /// Title, duration and description.
  Full,
  /// Title and duration only.
  Compact,
}

/// What the caller wants displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRequest {
  All,
  Search(String),
  Newest(usize),
  Related { id: i64, n: usize },
}

impl ViewRequest {
  pub fn variant(&self) -> CardVariant {
    match self {
      ViewRequest::Related { .. } => CardVariant::Compact,
      _ => CardVariant::Full,
    }
  }

  /// Message rendered in place of an empty result.
  pub fn empty_message(&self) -> &'static str {
    match self {
      ViewRequest::All | ViewRequest::Search(_) => "No videos found. Please try a different search.",
      ViewRequest::Newest(_) => "No new videos yet.",
      ViewRequest::Related { .. } => "No related videos found.",
    }
  }
}

/// An ordered selection of records ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
  pub records: Vec<&'a VideoRecord>,
  pub variant: CardVariant,
  empty_message: &'static str,
}

impl<'a> View<'a> {
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// The explicit empty-state text, only when there is nothing to show.
  pub fn empty_message(&self) -> Option<&'static str> {
    self.is_empty().then_some(self.empty_message)
  }

  pub fn get(&self, idx: usize) -> Option<&'a VideoRecord> {
    self.records.get(idx).copied()
  }

  pub fn ids(&self) -> Vec<i64> {
    self.records.iter().map(|r| r.id).collect()
  }
}

/// Compute the records for `request`.
pub fn select<'a>(catalog: &'a Catalog, request: &ViewRequest) -> Result<View<'a>, NotFoundError> {
  let records = match request {
    ViewRequest::All => catalog.iter().collect(),
    ViewRequest::Search(term) => search(catalog, term),
    ViewRequest::Newest(n) => newest(catalog, *n),
    ViewRequest::Related { id, n } => related(catalog, *id, *n)?,
  };
  Ok(View { records, variant: request.variant(), empty_message: request.empty_message() })
}
