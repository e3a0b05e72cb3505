use anyhow::Result;
use image::DynamicImage;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, VideoRecord};
use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::error::{LoadError, NotFoundError};
use crate::graphics::{ThumbnailJob, fetch_thumbnails, placeholder_thumbnail};
use crate::loader::{CatalogLoader, Location};
use crate::player::{NowPlaying, VideoPlayer, open_external};
use crate::route::Route;
use crate::theme::{THEMES, Theme, theme_index};
use crate::view::{self, View, ViewRequest};

// --- Types ---

/// Shown in place of the catalog when a load fails. The cause goes to the status line and the log.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load videos. Please try again later.";

pub type LoadResult = (u64, Result<Catalog, LoadError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
}

/// Lifecycle of the catalog behind the current screen.
#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
  NotLoaded,
  Loading { generation: u64 },
  Loaded(Catalog),
  LoadFailed(String),
}

/// Selection within a card grid laid out row-major. `columns` is set by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridState {
  pub selected: usize,
  pub columns: usize,
}

impl Default for GridState {
  fn default() -> Self {
    Self { selected: 0, columns: 1 }
  }
}

impl GridState {
  /// Move the selection; moves that would leave the grid are ignored.
  pub fn move_by(&mut self, dx: isize, dy: isize, len: usize) {
    if len == 0 {
      self.selected = 0;
      return;
    }
    let cols = self.columns.max(1) as isize;
    let current = self.selected.min(len - 1) as isize;
    let next = current + dx + dy * cols;
    if (0..len as isize).contains(&next) {
      self.selected = next as usize;
    } else {
      self.selected = current as usize;
    }
  }

  pub fn clamp(&mut self, len: usize) {
    self.selected = self.selected.min(len.saturating_sub(1));
  }
}

/// Decoded thumbnails by record id, fed by background fetches.
pub struct Thumbnails {
  images: HashMap<i64, DynamicImage>,
  requested: HashSet<i64>,
  pub placeholder: DynamicImage,
  tx: mpsc::Sender<(i64, DynamicImage)>,
  rx: mpsc::Receiver<(i64, DynamicImage)>,
}

impl Thumbnails {
  fn new() -> Self {
    let (tx, rx) = mpsc::channel(64);
    Self { images: HashMap::new(), requested: HashSet::new(), placeholder: placeholder_thumbnail(), tx, rx }
  }

  /// The decoded image for `id`, or `None` when the placeholder should be drawn.
  pub fn get(&self, id: i64) -> Option<&DynamicImage> {
    self.images.get(&id)
  }

  fn clear(&mut self) {
    self.images.clear();
    self.requested.clear();
    while self.rx.try_recv().is_ok() {}
  }
}

/// In-flight async task receivers and handles.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) load_rx: Option<oneshot::Receiver<LoadResult>>,
  pub(crate) thumb_handles: Vec<JoinHandle<()>>,
}

impl AsyncTasks {
  fn abort_thumbnails(&mut self) {
    for handle in self.thumb_handles.drain(..) {
      handle.abort();
    }
  }
}

pub struct App {
  /// Search box contents; the home grid filters on every edit.
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub route: Route,
  history: Vec<Route>,
  pub page: PageState,
  generation: u64,
  /// Selection in the home grid.
  pub grid: GridState,
  /// Selection in the detail page's related strip.
  pub related_grid: GridState,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub player: VideoPlayer,
  pub thumbnails: Thumbnails,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  loader: CatalogLoader,
  pub source: Location,
  pub(crate) tasks: AsyncTasks,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(settings: &Settings, loader: CatalogLoader, display_mode: DisplayMode, route: Route) -> Self {
    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: if route == Route::Home { AppMode::Input } else { AppMode::Results },
      route,
      history: Vec::new(),
      page: PageState::NotLoaded,
      generation: 0,
      grid: GridState::default(),
      related_grid: GridState::default(),
      theme_index: theme_index(settings.theme_name.as_deref()),
      display_mode,
      player: VideoPlayer::new(settings.player.clone()),
      thumbnails: Thumbnails::new(),
      last_error: None,
      status_message: None,
      should_quit: false,
      loader,
      source: settings.source.clone(),
      tasks: AsyncTasks::default(),
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    // theme_index only ever comes from theme_index() or modular arithmetic in next_theme().
    &THEMES[self.theme_index % THEMES.len()]
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after `error_dismiss_secs`.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.save();
  }

  // --- Catalog loading ---

  pub fn catalog(&self) -> Option<&Catalog> {
    match self.page {
      PageState::Loaded(ref catalog) => Some(catalog),
      _ => None,
    }
  }

  /// Start a new load generation; any result from an earlier one will be discarded.
  pub(crate) fn begin_load(&mut self) -> u64 {
    self.generation += 1;
    self.page = PageState::Loading { generation: self.generation };
    self.tasks.abort_thumbnails();
    self.thumbnails.clear();
    self.clear_error();
    self.status_message = Some("Loading videos…".to_string());
    self.generation
  }

  pub fn trigger_load(&mut self) {
    let generation = self.begin_load();
    info!(source = %self.source, generation, "catalog load triggered");

    let loader = self.loader.clone();
    let source = self.source.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send((generation, loader.load(&source).await));
    });
    self.tasks.load_rx = Some(rx);
  }

  /// Apply a finished load, unless a newer one has started since.
  pub fn apply_load(&mut self, generation: u64, result: Result<Catalog, LoadError>) {
    let pending = match self.page {
      PageState::Loading { generation: pending } => Some(pending),
      _ => None,
    };
    if pending != Some(generation) {
      debug!(generation, pending = ?pending, "discarding stale catalog load");
      return;
    }
    self.status_message = None;
    match result {
      Ok(catalog) => {
        self.page = PageState::Loaded(catalog);
        self.grid.selected = 0;
        self.related_grid.selected = 0;
        self.resolve_route();
        self.request_thumbnails();
      }
      Err(e) => {
        warn!(source = %self.source, err = %e, "catalog load failed");
        self.page = PageState::LoadFailed(e.to_string());
        self.set_error(e.to_string());
      }
    }
  }

  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.tasks.load_rx.take() {
      match rx.try_recv() {
        Ok((generation, result)) => self.apply_load(generation, result),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.load_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.page = PageState::LoadFailed("load task ended without a result".to_string());
          self.set_error("Load task failed.".to_string());
        }
      }
    }

    while let Ok((id, image)) = self.thumbnails.rx.try_recv() {
      self.thumbnails.images.insert(id, image);
    }

    if self.player.reap() {
      self.status_message = None;
    }
  }

  // --- Views ---

  /// The home grid: the whole catalog, or the search matches.
  pub fn home_view(&self) -> Option<View<'_>> {
    let term = self.input.trim();
    let request = if term.is_empty() { ViewRequest::All } else { ViewRequest::Search(term.to_string()) };
    self.catalog().and_then(|catalog| view::select(catalog, &request).ok())
  }

  pub fn newest_view(&self) -> Option<View<'_>> {
    self.catalog().and_then(|catalog| view::select(catalog, &ViewRequest::Newest(constants().newest_count)).ok())
  }

  /// The record shown on the detail page.
  pub fn current_record(&self) -> Option<&VideoRecord> {
    match self.route {
      Route::Detail(id) => self.catalog().and_then(|catalog| catalog.find(id)),
      Route::Home => None,
    }
  }

  pub fn related_view(&self) -> Option<View<'_>> {
    let Route::Detail(id) = self.route else { return None };
    let request = ViewRequest::Related { id, n: constants().related_count };
    self.catalog().and_then(|catalog| view::select(catalog, &request).ok())
  }

  /// Called whenever the search box changes.
  pub fn search_changed(&mut self) {
    self.grid.selected = 0;
    if !self.input.trim().is_empty() {
      let matches = self.home_view().map(|v| v.ids()).unwrap_or_default();
      debug!(term = %self.input.trim(), matches = ?matches, "search updated");
    }
    self.request_thumbnails();
  }

  // --- Navigation ---

  /// Redirect a detail route whose id is not in the catalog back home.
  fn resolve_route(&mut self) {
    let Route::Detail(id) = self.route else { return };
    let Some(catalog) = self.catalog() else { return };
    if catalog.find(id).is_none() {
      let err = NotFoundError { id };
      warn!(err = %err, "redirecting to home");
      self.route = Route::Home;
      self.mode = AppMode::Input;
      self.status_message = Some(format!("{}. Showing all videos.", err));
    }
  }

  pub fn navigate(&mut self, route: Route) {
    if route == self.route {
      return;
    }
    info!(from = %self.route, to = %route, "navigate");
    self.history.push(self.route);
    self.route = route;
    self.related_grid = GridState { selected: 0, columns: self.related_grid.columns };
    self.status_message = None;
    self.resolve_route();
    self.request_thumbnails();
  }

  /// Return to the previous page. Returns false when there is nowhere to go back to.
  pub fn go_back(&mut self) -> bool {
    let Some(previous) = self.history.pop() else {
      if self.route == Route::Home {
        return false;
      }
      self.route = Route::Home;
      self.request_thumbnails();
      return true;
    };
    self.route = previous;
    self.resolve_route();
    self.request_thumbnails();
    true
  }

  /// Open the selected card of the current page.
  pub fn open_selected(&mut self) {
    let id = match self.route {
      Route::Home => self.home_view().and_then(|v| v.get(self.grid.selected)).map(|r| r.id),
      Route::Detail(_) => self.related_view().and_then(|v| v.get(self.related_grid.selected)).map(|r| r.id),
    };
    if let Some(id) = id {
      self.navigate(Route::Detail(id));
    }
  }

  /// Open the `idx`th card of the "new" strip.
  pub fn open_newest(&mut self, idx: usize) {
    if let Some(id) = self.newest_view().and_then(|v| v.get(idx)).map(|r| r.id) {
      self.navigate(Route::Detail(id));
    }
  }

  // --- Thumbnails ---

  /// Fetch thumbnails for everything the current page shows that is not cached or in flight.
  pub fn request_thumbnails(&mut self) {
    let wanted: Vec<(i64, String)> = {
      let mut records: Vec<&VideoRecord> = Vec::new();
      match self.route {
        Route::Home => {
          records.extend(self.newest_view().map(|v| v.records).unwrap_or_default());
          records.extend(self.home_view().map(|v| v.records).unwrap_or_default());
        }
        Route::Detail(_) => {
          records.extend(self.current_record());
          records.extend(self.related_view().map(|v| v.records).unwrap_or_default());
        }
      }
      records.into_iter().filter(|r| r.has_thumbnail()).map(|r| (r.id, r.thumbnail.clone())).collect()
    };

    let mut jobs = Vec::new();
    for (id, thumbnail) in wanted {
      if !self.thumbnails.requested.insert(id) {
        continue;
      }
      match self.source.resolve(&thumbnail) {
        Some(location) => jobs.push(ThumbnailJob { id, location }),
        None => debug!(id, thumbnail = %thumbnail, "unusable thumbnail reference"),
      }
    }
    if jobs.is_empty() {
      return;
    }

    debug!(count = jobs.len(), "fetching thumbnails");
    self.tasks.thumb_handles.retain(|h| !h.is_finished());
    let client = self.loader.client().clone();
    let tx = self.thumbnails.tx.clone();
    self.tasks.thumb_handles.push(tokio::spawn(fetch_thumbnails(client, jobs, tx)));
  }

  // --- Playback ---

  /// Where the current record's video lives, resolved against the catalog source.
  pub fn media_target(&self) -> Option<String> {
    let record = self.current_record()?;
    self.source.resolve(&record.video_url).map(|location| location.to_string())
  }

  pub async fn play_current(&mut self) {
    let Some(record) = self.current_record() else { return };
    let (id, title) = (record.id, record.title.clone());
    let Some(target) = self.media_target() else {
      self.set_error(format!("\"{}\" has no playable video URL.", title));
      return;
    };
    self.clear_error();
    match self.player.play(NowPlaying { id, title: title.clone(), target }).await {
      Ok(()) => self.status_message = Some(format!("Playing \"{}\"", title)),
      Err(e) => {
        self.set_error(format!("Playback error: {:#}", e));
        if let Err(e) = self.player.stop().await {
          warn!(err = %e, "failed to stop player after playback error");
        }
      }
    }
  }

  pub async fn stop_playback(&mut self) -> Result<()> {
    if self.player.is_playing() {
      self.player.stop().await?;
      self.status_message = None;
    }
    Ok(())
  }

  pub fn open_current_in_browser(&mut self) {
    let Some(target) = self.media_target() else { return };
    if let Err(e) = open_external(&target) {
      self.set_error(format!("Failed to open browser: {:#}", e));
    }
  }

  /// Tear down background work before exit.
  pub async fn shutdown(&mut self) -> Result<()> {
    self.tasks.abort_thumbnails();
    self.tasks.load_rx = None;
    self.player.stop().await
  }
}
