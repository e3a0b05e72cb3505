use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode, LOAD_FAILED_MESSAGE, PageState};
use crate::catalog::VideoRecord;
use crate::constants::constants;
use crate::graphics::ThumbnailWidget;
use crate::route::Route;
use crate::theme::Theme;
use crate::view::CardVariant;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

const CARD_WIDTH: u16 = 30;

fn card_height(variant: CardVariant) -> u16 {
  match variant {
    CardVariant::Full => 12,
    CardVariant::Compact => 9,
  }
}

fn thumbnail_rows(variant: CardVariant) -> u16 {
  match variant {
    CardVariant::Full => 6,
    CardVariant::Compact => 5,
  }
}

/// How many cards fit side by side in `width` cells.
pub fn grid_columns(width: u16) -> usize {
  (width / CARD_WIDTH).max(1) as usize
}

fn rounded_block<'a>(theme: &Theme, title: impl Into<Line<'a>>, focused: bool) -> Block<'a> {
  let color = if focused { theme.accent } else { theme.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg).fg(theme.fg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  match app.route {
    Route::Home => render_home(frame, app, main_area),
    Route::Detail(_) => render_detail(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(vec![
    Span::styled(" ▶ reel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(app.route.href(), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

/// Loading, failure and other non-catalog states of the main area.
fn render_page_state(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let text = match app.page {
    PageState::NotLoaded | PageState::Loading { .. } => {
      vec![Line::from(""), Line::from(Span::styled("Loading videos…", Style::default().fg(theme.status)))]
    }
    PageState::LoadFailed(ref cause) => vec![
      Line::from(""),
      Line::from(Span::styled(LOAD_FAILED_MESSAGE, Style::default().fg(theme.error).add_modifier(Modifier::BOLD))),
      Line::from(""),
      Line::from(Span::styled(cause.as_str(), Style::default().fg(theme.muted))),
      Line::from(Span::styled("Press r to retry.", Style::default().fg(theme.muted))),
    ],
    PageState::Loaded(_) => {
      vec![Line::from(""), Line::from(Span::styled("Video not found.", Style::default().fg(theme.muted)))]
    }
  };
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded_block(theme, "", false));
  frame.render_widget(paragraph, area);
}

// --- Cards ---

/// A titled, precomputed sequence of records to lay out as cards.
struct CardGrid<'a> {
  title: String,
  records: &'a [&'a VideoRecord],
  variant: CardVariant,
  selected: Option<usize>,
  empty_message: Option<&'static str>,
  /// Label each card with its 1-based position (shortcut keys).
  numbered: bool,
}

/// Render a grid of cards inside a titled block. Returns the number of columns used.
fn render_cards(frame: &mut Frame, app: &App, grid: CardGrid<'_>, area: Rect) -> usize {
  let theme = app.theme();
  let block = rounded_block(theme, grid.title, grid.selected.is_some());
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let columns = grid_columns(inner.width);
  if let Some(msg) = grid.empty_message {
    let text = vec![Line::from(""), Line::from(Span::styled(msg, Style::default().fg(theme.muted)))];
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).wrap(Wrap { trim: true }), inner);
    return columns;
  }

  let card_w = inner.width / columns as u16;
  let card_h = card_height(grid.variant);
  let visible_rows = (inner.height / card_h).max(1) as usize;
  let selected_row = grid.selected.unwrap_or(0) / columns;
  let first_row = selected_row.saturating_sub(visible_rows - 1);

  for (i, record) in grid.records.iter().enumerate().skip(first_row * columns).take(visible_rows * columns) {
    let row = (i / columns - first_row) as u16;
    let col = (i % columns) as u16;
    let y = inner.y + row * card_h;
    let card_area =
      Rect { x: inner.x + col * card_w, y, width: card_w, height: card_h.min(inner.bottom().saturating_sub(y)) };
    if card_area.height < 3 {
      continue;
    }
    let number = grid.numbered.then_some(i + 1);
    render_card(frame, app, record, grid.variant, grid.selected == Some(i), number, card_area);
  }
  columns
}

fn render_card(
  frame: &mut Frame,
  app: &App,
  record: &VideoRecord,
  variant: CardVariant,
  selected: bool,
  number: Option<usize>,
  area: Rect,
) {
  let theme = app.theme();
  let border = if selected { theme.accent } else { theme.border };
  let mut block = Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(border));
  if let Some(n) = number {
    block = block.title(Span::styled(format!(" {} ", n), Style::default().fg(theme.key_fg).bg(theme.key_bg)));
  }
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let thumb_h = thumbnail_rows(variant).min(inner.height.saturating_sub(2));
  let [thumb_area, text_area] = Layout::vertical([Constraint::Length(thumb_h), Constraint::Min(0)]).areas(inner);
  render_thumbnail(frame, app, record.id, thumb_area);

  let w = text_area.width as usize;
  let title_style = if selected {
    Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)
  };
  let mut lines =
    vec![Line::from(Span::styled(truncate_str(&record.title, w), title_style)), meta_line(theme, record, w)];
  if variant == CardVariant::Full && !record.description.is_empty() {
    lines.push(Line::from(Span::styled(record.description.as_str(), Style::default().fg(theme.muted))));
  }
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), text_area);
}

/// "12:34 · Category", truncated to `w`.
fn meta_line(theme: &Theme, record: &VideoRecord, w: usize) -> Line<'static> {
  let meta = match (record.duration.is_empty(), record.category.as_deref()) {
    (false, Some(category)) => format!("{} · {}", record.duration, category),
    (false, None) => record.duration.clone(),
    (true, Some(category)) => category.to_string(),
    (true, None) => String::new(),
  };
  Line::from(Span::styled(truncate_str(&meta, w), Style::default().fg(theme.muted)))
}

fn render_thumbnail(frame: &mut Frame, app: &App, id: i64, area: Rect) {
  if area.is_empty() {
    return;
  }
  let (image, label) = match app.thumbnails.get(id) {
    Some(image) => (image, None),
    None => (&app.thumbnails.placeholder, Some(constants().placeholder_label.as_str())),
  };
  frame.render_widget(ThumbnailWidget { image, display_mode: app.display_mode, label }, area);
}

// --- Pages ---

fn render_home(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.catalog().is_none() {
    render_page_state(frame, app, area);
    return;
  }

  let focused = app.mode == AppMode::Results;
  let term = app.input.trim().to_string();
  // The "new" strip gives way to results while a search is active.
  let show_newest = term.is_empty() && area.height >= card_height(CardVariant::Compact) * 2 + 4;
  let newest_h = if show_newest { card_height(CardVariant::Compact) + 2 } else { 0 };
  let [new_area, grid_area] = Layout::vertical([Constraint::Length(newest_h), Constraint::Min(3)]).areas(area);

  let (columns, count) = {
    if show_newest && let Some(newest) = app.newest_view() {
      let grid = CardGrid {
        title: " New Videos ".to_string(),
        records: &newest.records,
        variant: CardVariant::Compact,
        selected: None,
        empty_message: newest.empty_message(),
        numbered: true,
      };
      render_cards(frame, app, grid, new_area);
    }

    let Some(view) = app.home_view() else { return };
    let title = if term.is_empty() {
      format!(" All Videos ({}) ", view.len())
    } else {
      format!(" Results for \"{}\" ({}) ", truncate_str(&term, 30), view.len())
    };
    let grid = CardGrid {
      title,
      records: &view.records,
      variant: view.variant,
      selected: focused.then_some(app.grid.selected),
      empty_message: view.empty_message(),
      numbered: false,
    };
    (render_cards(frame, app, grid, grid_area), view.len())
  };
  app.grid.columns = columns;
  app.grid.clamp(count);
}

fn render_detail(frame: &mut Frame, app: &mut App, area: Rect) {
  let Some(record) = app.current_record() else {
    render_page_state(frame, app, area);
    return;
  };
  let theme = app.theme();

  let related_h = card_height(CardVariant::Compact) + 2;
  let [top_area, related_area] = Layout::vertical([Constraint::Min(6), Constraint::Length(related_h)]).areas(area);
  let [mut thumb_area, info_area] =
    Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(top_area);

  // Pad and center vertically to keep roughly 16:9
  thumb_area = Rect { y: thumb_area.y + 1, height: thumb_area.height.saturating_sub(2), ..thumb_area };
  let ideal_h = (thumb_area.width as f32 * 9.0 / 32.0).round() as u16;
  if ideal_h < thumb_area.height {
    thumb_area.y += (thumb_area.height - ideal_h) / 2;
    thumb_area.height = ideal_h;
  }
  render_thumbnail(frame, app, record.id, thumb_area);

  let playing = app.player.now_playing.as_ref().is_some_and(|np| np.id == record.id);
  let title = if playing { " Now Playing " } else { " Details " };
  let info_block = rounded_block(theme, title, false).padding(Padding::horizontal(1));
  let inner_w = info_area.width.saturating_sub(4) as usize;

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(record.title.as_str(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
  ];
  if !record.duration.is_empty() {
    lines.push(Line::from(vec![
      Span::styled("Duration  ", Style::default().fg(theme.muted)),
      Span::styled(record.duration.as_str(), Style::default().fg(theme.fg)),
    ]));
  }
  if let Some(ref category) = record.category {
    lines.push(Line::from(vec![
      Span::styled("Category  ", Style::default().fg(theme.muted)),
      Span::styled(category.as_str(), Style::default().fg(theme.fg)),
    ]));
  }
  if !record.description.is_empty() {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(record.description.as_str(), Style::default().fg(theme.fg))));
  }
  lines.push(Line::from(""));
  match app.media_target() {
    Some(target) => lines.push(Line::from(Span::styled(
      truncate_str(&target, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    ))),
    None => lines.push(Line::from(Span::styled("No video URL", Style::default().fg(theme.muted)))),
  }
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(info_block), info_area);

  let (columns, count) = {
    let Some(related) = app.related_view() else { return };
    let grid = CardGrid {
      title: " Related Videos ".to_string(),
      records: &related.records,
      variant: related.variant,
      selected: (app.mode == AppMode::Results).then_some(app.related_grid.selected),
      empty_message: related.empty_message(),
      numbered: false,
    };
    (render_cards(frame, app, grid, related_area), related.len())
  };
  app.related_grid.columns = columns;
  app.related_grid.clamp(count);
}

// --- Chrome ---

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(np) = &app.player.now_playing {
    (format!(" ▶ {}", np.title), Style::default().fg(theme.status))
  } else if let Some(catalog) = app.catalog() {
    (format!(" {} videos from {}", catalog.len(), app.source), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search videos ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll || inner_w == 0 {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let loaded = app.catalog().is_some();
  let mut keys: Vec<(&str, &str)> = match (app.mode, app.route) {
    (AppMode::Input, _) => {
      let mut k = Vec::new();
      if loaded {
        k.push(("Enter", "Browse"));
      }
      k.push(("Esc", if app.input.is_empty() { "Quit" } else { "Clear" }));
      k
    }
    (AppMode::Results, Route::Home) => {
      vec![("Enter", "Open"), ("hjkl", "Move"), ("1-4", "New"), ("/", "Search"), ("r", "Reload"), ("q", "Quit")]
    }
    (AppMode::Results, Route::Detail(_)) => {
      vec![("p", "Play"), ("o", "Browser"), ("←/→", "Related"), ("Enter", "Open"), ("Esc", "Back"), ("q", "Quit")]
    }
  };
  if app.player.is_playing() {
    keys.push(("^s", "Stop"));
  }
  keys.push(("^t", "Theme"));

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{Catalog, CatalogShape, parse_catalog};
  use crate::config::{Config, Overrides, Settings};
  use crate::display::DisplayMode;
  use crate::error::LoadError;
  use crate::loader::CatalogLoader;
  use ratatui::{Terminal, backend::TestBackend};

  fn app(route: Route) -> App {
    let settings = Settings::resolve(&Config::default(), &Overrides::default()).unwrap();
    let loader = CatalogLoader::new(settings.loader).unwrap();
    App::new(&settings, loader, DisplayMode::Ascii, route)
  }

  fn animals() -> Catalog {
    let json = r#"[
      {"id": 1, "title": "Cats", "description": "Whiskers", "category": "Animals", "duration": "2:10"},
      {"id": 2, "title": "Dogs", "description": "Paws", "category": "Animals", "duration": "3:20"},
      {"id": 3, "title": "Cars", "description": "Wheels", "category": "Vehicles", "duration": "4:30"}
    ]"#;
    parse_catalog(json.as_bytes(), CatalogShape::Auto).unwrap()
  }

  fn draw(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
    terminal.draw(|frame| ui(frame, app)).unwrap();
    terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect()
  }

  #[test]
  fn truncate_str_appends_ellipsis() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("a longer title", 8), "a longe…");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("abc", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
  }

  #[test]
  fn grid_columns_never_zero() {
    assert_eq!(grid_columns(0), 1);
    assert_eq!(grid_columns(CARD_WIDTH * 3 + 5), 3);
  }

  #[tokio::test]
  async fn home_shows_cards_and_empty_search_message() {
    let mut app = app(Route::Home);
    let generation = app.begin_load();
    app.apply_load(generation, Ok(animals()));
    let screen = draw(&mut app);
    assert!(screen.contains("All Videos (3)"));
    assert!(screen.contains("Cats"));
    assert!(screen.contains("New Videos"));

    app.input = "submarine".to_string();
    app.search_changed();
    let screen = draw(&mut app);
    assert!(screen.contains("No videos found. Please try a different search."));
  }

  #[tokio::test]
  async fn failed_load_shows_fixed_message() {
    let mut app = app(Route::Home);
    let generation = app.begin_load();
    app.apply_load(generation, Err(LoadError::InvalidSource { input: String::new() }));
    let screen = draw(&mut app);
    assert!(screen.contains(LOAD_FAILED_MESSAGE));
  }

  #[tokio::test]
  async fn detail_page_lists_related_or_says_none() {
    let mut app = app(Route::Detail(3));
    let generation = app.begin_load();
    app.apply_load(generation, Ok(animals()));
    let screen = draw(&mut app);
    assert!(screen.contains("Wheels"));
    assert!(screen.contains("No related videos found."));
    assert!(screen.contains("Video Thumbnail"));
  }

  #[tokio::test]
  async fn narrow_search_box_keeps_cursor_in_bounds() {
    let mut app = app(Route::Home);
    app.input = "kittens".to_string();
    app.cursor_position = 5;
    let mut terminal = Terminal::new(TestBackend::new(3, 3)).unwrap();
    terminal.draw(|frame| render_input(frame, &mut app, frame.area())).unwrap();
    assert_eq!(app.input_scroll, 5);
  }
}
