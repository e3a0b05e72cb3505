use thiserror::Error;

/// Why a catalog could not be loaded. No partial catalog is ever produced.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("invalid catalog source: {input:?}")]
  InvalidSource { input: String },

  #[error("failed to build HTTP client: {source}")]
  Client {
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} timed out")]
  Timeout { url: String },

  #[error("{url} returned HTTP {status}")]
  Status { url: String, status: reqwest::StatusCode },

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("catalog is not a valid {expected}: {source}")]
  Parse {
    expected: &'static str,
    #[source]
    source: serde_json::Error,
  },
}

/// The requested video id is absent from the loaded catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no video with id {id} in the catalog")]
pub struct NotFoundError {
  pub id: i64,
}
