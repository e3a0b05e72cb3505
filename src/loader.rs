//! Catalog loading from a URL or a local file.
//!
//! A load is one transfer followed by one parse. Failures never yield a partial
//! catalog and are never retried here; the caller decides what to show.

use chrono::Utc;
use clap::ValueEnum;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogShape, parse_catalog};
use crate::error::LoadError;

/// Where a catalog (or one of its assets) lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
  Remote(Url),
  File(PathBuf),
}

impl FromStr for Location {
  type Err = LoadError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || LoadError::InvalidSource { input: s.to_string() };
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(invalid());
    }
    match Url::parse(trimmed) {
      // One-letter schemes are Windows drive letters, not URLs.
      Ok(url) if url.scheme().len() > 1 => {
        return match url.scheme() {
          "http" | "https" => Ok(Location::Remote(url)),
          "file" => url.to_file_path().map(Location::File).map_err(|_| invalid()),
          _ => Err(invalid()),
        };
      }
      Ok(_) => {}
      Err(_) => {
        let lower = trimmed.to_ascii_lowercase();
        if ["http:", "https:", "file:"].iter().any(|scheme| lower.starts_with(scheme)) {
          return Err(invalid());
        }
      }
    }
    Ok(Location::File(PathBuf::from(trimmed)))
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Location::Remote(url) => write!(f, "{}", url),
      Location::File(path) => write!(f, "{}", path.display()),
    }
  }
}

impl Location {
  /// Resolve a reference found inside the catalog (thumbnail, video URL) against
  /// this location. Absolute URLs pass through; blank references resolve to nothing.
  pub fn resolve(&self, reference: &str) -> Option<Location> {
    let reference = reference.trim();
    if reference.is_empty() {
      return None;
    }
    if let Ok(url) = Url::parse(reference) {
      return match url.scheme() {
        "http" | "https" => Some(Location::Remote(url)),
        "file" => url.to_file_path().ok().map(Location::File),
        _ => None,
      };
    }
    match self {
      Location::Remote(base) => base.join(reference).ok().map(Location::Remote),
      Location::File(path) => {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Some(Location::File(dir.join(reference)))
      }
    }
  }
}

/// How a remote catalog interacts with intermediate caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
  /// Plain GET; caches may serve a stale copy.
  #[default]
  Default,
  /// Append a unique `_=<token>` query parameter on every request.
  Bust,
  /// Send `If-None-Match` with the last seen ETag and reuse the catalog on 304.
  Revalidate,
}

impl CacheMode {
  pub fn label(self) -> &'static str {
    match self {
      CacheMode::Default => "default",
      CacheMode::Bust => "bust",
      CacheMode::Revalidate => "revalidate",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
  pub shape: CatalogShape,
  pub cache_mode: CacheMode,
  pub timeout: Duration,
}

static BUST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A token that differs on every call within this process.
pub fn cache_bust_token() -> String {
  let seq = BUST_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("{}-{}", Utc::now().timestamp_millis(), seq)
}

/// `url` with a fresh cache-busting parameter appended; other parameters are kept.
pub fn cache_busted(url: &Url) -> Url {
  let mut busted = url.clone();
  busted.query_pairs_mut().append_pair("_", &cache_bust_token());
  busted
}

#[derive(Debug, Clone)]
struct Validated {
  etag: String,
  catalog: Catalog,
}

/// Loads catalogs. Cheap to clone; clones share the HTTP client and ETag memory.
#[derive(Clone)]
pub struct CatalogLoader {
  client: Client,
  options: LoaderOptions,
  validated: Arc<Mutex<HashMap<String, Validated>>>,
}

impl CatalogLoader {
  pub fn new(options: LoaderOptions) -> Result<Self, LoadError> {
    let client = Client::builder()
      .timeout(options.timeout)
      .user_agent(concat!("reel/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|source| LoadError::Client { source })?;
    Ok(Self::with_client(client, options))
  }

  pub fn with_client(client: Client, options: LoaderOptions) -> Self {
    Self { client, options, validated: Arc::new(Mutex::new(HashMap::new())) }
  }

  pub fn client(&self) -> &Client {
    &self.client
  }

  /// Fetch and parse the catalog at `source`.
  pub async fn load(&self, source: &Location) -> Result<Catalog, LoadError> {
    let catalog = match source {
      Location::Remote(url) => self.fetch(url).await?,
      Location::File(path) => self.read(path).await?,
    };
    let dups = catalog.duplicate_ids();
    if !dups.is_empty() {
      warn!(source = %source, ids = ?dups, "catalog contains duplicate ids; lookups use the first occurrence");
    }
    if catalog.is_empty() {
      warn!(source = %source, "catalog has no videos");
    }
    info!(source = %source, videos = catalog.len(), "catalog loaded");
    Ok(catalog)
  }

  async fn read(&self, path: &Path) -> Result<Catalog, LoadError> {
    let bytes = tokio::fs::read(path)
      .await
      .map_err(|source| LoadError::Io { path: path.display().to_string(), source })?;
    parse_catalog(&bytes, self.options.shape)
  }

  async fn fetch(&self, url: &Url) -> Result<Catalog, LoadError> {
    let request_url = match self.options.cache_mode {
      CacheMode::Bust => cache_busted(url),
      CacheMode::Default | CacheMode::Revalidate => url.clone(),
    };
    let remembered = match self.options.cache_mode {
      CacheMode::Revalidate => self.remembered(url),
      _ => None,
    };

    let mut request = self.client.get(request_url.clone());
    if let Some(ref v) = remembered {
      request = request.header(IF_NONE_MATCH, v.etag.as_str());
    }
    debug!(url = %request_url, revalidate = remembered.is_some(), "requesting catalog");

    let response = request.send().await.map_err(|e| request_error(url, e))?;
    let status = response.status();

    if status == StatusCode::NOT_MODIFIED
      && let Some(v) = remembered
    {
      debug!(url = %url, etag = %v.etag, "catalog not modified");
      return Ok(v.catalog);
    }
    if !status.is_success() {
      return Err(LoadError::Status { url: url.to_string(), status });
    }

    let etag = response.headers().get(ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body = response.bytes().await.map_err(|e| request_error(url, e))?;
    let catalog = parse_catalog(&body, self.options.shape)?;

    if self.options.cache_mode == CacheMode::Revalidate
      && let Some(etag) = etag
    {
      self.remember(url, Validated { etag, catalog: catalog.clone() });
    }
    Ok(catalog)
  }

  fn remembered(&self, url: &Url) -> Option<Validated> {
    self.validated.lock().unwrap_or_else(PoisonError::into_inner).get(url.as_str()).cloned()
  }

  fn remember(&self, url: &Url, validated: Validated) {
    self.validated.lock().unwrap_or_else(PoisonError::into_inner).insert(url.to_string(), validated);
  }
}

fn request_error(url: &Url, source: reqwest::Error) -> LoadError {
  if source.is_timeout() {
    LoadError::Timeout { url: url.to_string() }
  } else {
    LoadError::Request { url: url.to_string(), source }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  const DOC: &str = r#"{"videos": [
    {"id": 1, "title": "Cats", "category": "Animals"},
    {"id": 2, "title": "Dogs", "category": "Animals"},
    {"id": 3, "title": "Cars", "category": "Vehicles"}
  ]}"#;

  fn options(cache_mode: CacheMode) -> LoaderOptions {
    LoaderOptions { shape: CatalogShape::Auto, cache_mode, timeout: Duration::from_secs(5) }
  }

  fn loader(cache_mode: CacheMode) -> CatalogLoader {
    let client = Client::builder().no_proxy().timeout(Duration::from_secs(5)).build().unwrap();
    CatalogLoader::with_client(client, options(cache_mode))
  }

  fn ids(catalog: &Catalog) -> Vec<i64> {
    catalog.iter().map(|v| v.id).collect()
  }

  fn response(status: &str, extra_headers: &str, body: &str) -> String {
    format!(
      "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
      status,
      body.len(),
      extra_headers,
      body
    )
  }

  /// Serve one canned response per connection; returns the raw requests received (lowercased).
  async fn serve(responses: Vec<String>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let mut seen = Vec::new();
      for reply in responses {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
          let n = socket.read(&mut buf).await.unwrap();
          if n == 0 {
            break;
          }
          raw.extend_from_slice(&buf[..n]);
        }
        seen.push(String::from_utf8_lossy(&raw).to_lowercase());
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
      }
      seen
    });
    let url = Url::parse(&format!("http://{}/videos.json?lang=en", addr)).unwrap();
    (url, handle)
  }

  // --- Location ---

  #[test]
  fn location_from_str() {
    assert!(matches!("https://example.com/videos.json".parse::<Location>(), Ok(Location::Remote(_))));
    assert_eq!("videos.json".parse::<Location>().unwrap(), Location::File(PathBuf::from("videos.json")));
    let file_url = "file:///srv/videos.json".parse::<Location>().unwrap();
    assert_eq!(file_url, Location::File(PathBuf::from("/srv/videos.json")));
    assert!(matches!("   ".parse::<Location>(), Err(LoadError::InvalidSource { .. })));
    assert!(matches!("http://".parse::<Location>(), Err(LoadError::InvalidSource { .. })));
    let upper = "HTTPS://Example.com/videos.json".parse::<Location>().unwrap();
    assert_eq!(upper.to_string(), "https://example.com/videos.json");
    assert!(matches!("ftp://example.com/videos.json".parse::<Location>(), Err(LoadError::InvalidSource { .. })));
  }

  #[test]
  fn resolve_relative_references() {
    let remote: Location = "https://cdn.example.com/site/videos.json".parse().unwrap();
    assert_eq!(remote.resolve("thumbs/1.jpg").unwrap().to_string(), "https://cdn.example.com/site/thumbs/1.jpg");
    assert_eq!(remote.resolve("https://img.example.org/a.png").unwrap().to_string(), "https://img.example.org/a.png");
    assert_eq!(remote.resolve("  "), None);
    assert_eq!(remote.resolve("data:image/png;base64,AAAA"), None);

    let local: Location = "/srv/site/videos.json".parse().unwrap();
    assert_eq!(local.resolve("thumbs/1.jpg"), Some(Location::File(PathBuf::from("/srv/site/thumbs/1.jpg"))));
  }

  // --- cache busting ---

  #[test]
  fn bust_tokens_differ_on_every_call() {
    let tokens: Vec<String> = (0..100).map(|_| cache_bust_token()).collect();
    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), tokens.len());
  }

  #[test]
  fn busted_url_keeps_resource_and_query() {
    let url = Url::parse("https://example.com/data/videos.json?lang=en").unwrap();
    let busted = cache_busted(&url);
    assert_eq!(busted.path(), "/data/videos.json");
    let pairs: Vec<(String, String)> = busted.query_pairs().into_owned().collect();
    assert_eq!(pairs[0], ("lang".to_string(), "en".to_string()));
    assert_eq!(pairs[1].0, "_");
    assert_ne!(cache_busted(&url), busted);
  }

  // --- file sources ---

  #[tokio::test]
  async fn loads_file_in_source_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DOC.as_bytes()).unwrap();
    let source = Location::File(file.path().to_path_buf());
    let catalog = loader(CacheMode::Default).load(&source).await.unwrap();
    assert_eq!(ids(&catalog), vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = Location::File(dir.path().join("nope.json"));
    let err = loader(CacheMode::Default).load(&source).await.unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
  }

  #[tokio::test]
  async fn malformed_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"videos": [{"id": "one"}]}"#).unwrap();
    let source = Location::File(file.path().to_path_buf());
    let err = loader(CacheMode::Default).load(&source).await.unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
  }

  // --- remote sources ---

  #[tokio::test]
  async fn loads_remote_catalog() {
    let (url, server) = serve(vec![response("200 OK", "", DOC)]).await;
    let catalog = loader(CacheMode::Default).load(&Location::Remote(url)).await.unwrap();
    assert_eq!(ids(&catalog), vec![1, 2, 3]);
    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("get /videos.json?lang=en http/1.1"));
  }

  #[tokio::test]
  async fn non_success_status_is_load_error() {
    let (url, server) = serve(vec![response("404 Not Found", "", "missing")]).await;
    let err = loader(CacheMode::Default).load(&Location::Remote(url)).await.unwrap_err();
    assert!(matches!(err, LoadError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    server.await.unwrap();
  }

  #[tokio::test]
  async fn bust_mode_sends_distinct_tokens() {
    let (url, server) = serve(vec![response("200 OK", "", DOC), response("200 OK", "", DOC)]).await;
    let loader = loader(CacheMode::Bust);
    let source = Location::Remote(url);
    loader.load(&source).await.unwrap();
    loader.load(&source).await.unwrap();
    let requests = server.await.unwrap();
    let lines: Vec<&str> = requests.iter().map(|r| r.lines().next().unwrap()).collect();
    assert!(lines.iter().all(|l| l.starts_with("get /videos.json?lang=en&_=")));
    assert_ne!(lines[0], lines[1]);
  }

  #[tokio::test]
  async fn revalidate_reuses_catalog_on_not_modified() {
    let (url, server) = serve(vec![
      response("200 OK", "ETag: \"v1\"\r\n", DOC),
      response("304 Not Modified", "ETag: \"v1\"\r\n", ""),
    ])
    .await;
    let loader = loader(CacheMode::Revalidate);
    let source = Location::Remote(url);
    let first = loader.load(&source).await.unwrap();
    let second = loader.load(&source).await.unwrap();
    assert_eq!(first, second);
    let requests = server.await.unwrap();
    assert!(!requests[0].contains("if-none-match"));
    assert!(requests[1].contains("if-none-match: \"v1\""));
  }

  #[tokio::test]
  async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/videos.json", listener.local_addr().unwrap())).unwrap();
    let server = tokio::spawn(async move {
      let (socket, _) = listener.accept().await.unwrap();
      tokio::time::sleep(Duration::from_secs(10)).await;
      drop(socket);
    });
    let client = Client::builder().no_proxy().timeout(Duration::from_secs(1)).build().unwrap();
    let loader = CatalogLoader::with_client(client, options(CacheMode::Default));
    let err = loader.load(&Location::Remote(url.clone())).await.unwrap_err();
    assert!(matches!(err, LoadError::Timeout { url: ref u } if *u == url.to_string()));
    server.abort();
  }

  #[tokio::test]
  async fn not_modified_without_prior_load_is_error() {
    let (url, server) = serve(vec![response("304 Not Modified", "", "")]).await;
    let err = loader(CacheMode::Revalidate).load(&Location::Remote(url)).await.unwrap_err();
    assert!(matches!(err, LoadError::Status { .. }));
    server.await.unwrap();
  }
}
