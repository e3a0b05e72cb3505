use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::Write;

use crate::catalog::{Catalog, CatalogShape, VideoRecord};
use crate::config::{Overrides, Settings};
use crate::constants::constants;
use crate::display::CliDisplayMode;
use crate::error::NotFoundError;
use crate::loader::{CacheMode, CatalogLoader};
use crate::view::{self, CardVariant, View, ViewRequest};

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct Args {
  /// Catalog location: an http(s) URL, a file:// URL or a local path (default: videos.json)
  #[arg(short, long, global = true)]
  pub source: Option<String>,

  /// Catalog document shape: 'auto', 'wrapped' ({"videos": [...]}) or 'bare' ([...])
  #[arg(long, value_enum, global = true)]
  pub shape: Option<CatalogShape>,

  /// HTTP caching: 'default', 'bust' (unique query token) or 'revalidate' (ETag)
  #[arg(long = "cache", value_enum, global = true)]
  pub cache_mode: Option<CacheMode>,

  /// Request timeout in seconds
  #[arg(long = "timeout", value_name = "SECS", global = true)]
  pub timeout_secs: Option<u64>,

  /// Player command; the video URL is appended as the last argument (default: mpv)
  #[arg(long, global = true)]
  pub player: Option<String>,

  /// Thumbnail rendering: 'auto', 'direct' or 'ascii' (default: auto-detect)
  #[arg(short, long, value_enum)]
  pub display_mode: Option<CliDisplayMode>,

  /// Page to open first, e.g. 'video.html?id=3'
  #[arg(long, value_name = "ADDRESS")]
  pub open: Option<String>,

  #[command(subcommand)]
  pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Print the catalog in order
  List {
    /// Only the newest videos
    #[arg(long)]
    new: bool,
    /// Print records as JSON
    #[arg(long)]
    json: bool,
  },
  /// Print videos whose title, description or category contain TERM
  Search {
    term: String,
    #[arg(long)]
    json: bool,
  },
  /// Print one video and its related videos
  Show {
    id: i64,
    #[arg(long)]
    json: bool,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

impl Args {
  pub fn overrides(&self) -> Overrides {
    Overrides {
      source: self.source.clone(),
      shape: self.shape,
      cache_mode: self.cache_mode,
      timeout_secs: self.timeout_secs,
      player: self.player.clone(),
      display_mode: self.display_mode,
    }
  }
}

/// Run a non-interactive subcommand, writing to stdout.
pub async fn run(command: Command, settings: &Settings) -> Result<()> {
  let mut out = std::io::stdout().lock();
  if let Command::Completions { shell } = command {
    clap_complete::generate(shell, &mut Args::command(), env!("CARGO_PKG_NAME"), &mut out);
    return Ok(());
  }

  let loader = CatalogLoader::new(settings.loader)?;
  let catalog =
    loader.load(&settings.source).await.with_context(|| format!("Failed to load videos from {}", settings.source))?;
  execute(&command, &catalog, &mut out)?;
  out.flush().context("Failed to flush stdout")
}

fn execute(command: &Command, catalog: &Catalog, out: &mut impl Write) -> Result<()> {
  match command {
    Command::List { new, json } => {
      let request = if *new { ViewRequest::Newest(constants().newest_count) } else { ViewRequest::All };
      print_view(out, &view::select(catalog, &request)?, *json)
    }
    Command::Search { term, json } => {
      print_view(out, &view::select(catalog, &ViewRequest::Search(term.clone()))?, *json)
    }
    Command::Show { id, json } => {
      let record = catalog.find(*id).ok_or(NotFoundError { id: *id })?;
      let related = view::select(catalog, &ViewRequest::Related { id: *id, n: constants().related_count })?;
      if *json {
        let doc = serde_json::json!({ "video": record, "related": related.records });
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        return Ok(());
      }
      write_detail(out, record)?;
      writeln!(out)?;
      writeln!(out, "Related videos:")?;
      write_view(out, &related)?;
      Ok(())
    }
    Command::Completions { .. } => Ok(()),
  }
}

fn print_view(out: &mut impl Write, view: &View<'_>, json: bool) -> Result<()> {
  if json {
    writeln!(out, "{}", serde_json::to_string_pretty(&view.records)?)?;
  } else {
    write_view(out, view)?;
  }
  Ok(())
}

fn write_view(out: &mut impl Write, view: &View<'_>) -> std::io::Result<()> {
  if let Some(msg) = view.empty_message() {
    return writeln!(out, "{}", msg);
  }
  for record in &view.records {
    write_card(out, record, view.variant)?;
  }
  Ok(())
}

fn meta(record: &VideoRecord) -> String {
  [Some(record.duration.as_str()).filter(|d| !d.is_empty()), record.category.as_deref()]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" · ")
}

fn write_card(out: &mut impl Write, record: &VideoRecord, variant: CardVariant) -> std::io::Result<()> {
  writeln!(out, "{:>5}  {}", format!("#{}", record.id), record.title)?;
  let meta = meta(record);
  if !meta.is_empty() {
    writeln!(out, "       {}", meta)?;
  }
  if variant == CardVariant::Full && !record.description.is_empty() {
    writeln!(out, "       {}", record.description)?;
  }
  Ok(())
}

fn write_detail(out: &mut impl Write, record: &VideoRecord) -> std::io::Result<()> {
  writeln!(out, "{}", record.title)?;
  if !record.duration.is_empty() {
    writeln!(out, "Duration  {}", record.duration)?;
  }
  if let Some(ref category) = record.category {
    writeln!(out, "Category  {}", category)?;
  }
  if !record.video_url.is_empty() {
    writeln!(out, "Video     {}", record.video_url)?;
  }
  if !record.description.is_empty() {
    writeln!(out)?;
    writeln!(out, "{}", record.description)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::parse_catalog;

  fn animals() -> Catalog {
    let json = r#"{"videos": [
      {"id": 1, "title": "Cats", "description": "Whiskers", "category": "Animals", "duration": "2:10"},
      {"id": 2, "title": "Dogs", "description": "Paws", "category": "Animals", "videoUrl": "v/2.mp4"},
      {"id": 3, "title": "Cars", "description": "Wheels", "category": "Vehicles"}
    ]}"#;
    parse_catalog(json.as_bytes(), CatalogShape::Auto).unwrap()
  }

  fn output(command: Command) -> Result<String> {
    let mut out = Vec::new();
    execute(&command, &animals(), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
  }

  #[test]
  fn parses_global_flags_and_subcommands() {
    let argv = ["reel", "search", "ca", "--json", "--cache", "revalidate", "--timeout", "3"];
    let args = Args::try_parse_from(argv).unwrap();
    assert_eq!(args.command, Some(Command::Search { term: "ca".to_string(), json: true }));
    let overrides = args.overrides();
    assert_eq!(overrides.cache_mode, Some(CacheMode::Revalidate));
    assert_eq!(overrides.timeout_secs, Some(3));

    let args = Args::try_parse_from(["reel", "--shape", "bare", "--open", "video.html?id=2"]).unwrap();
    assert_eq!(args.command, None);
    assert_eq!(args.shape, Some(CatalogShape::Bare));
    assert_eq!(args.open.as_deref(), Some("video.html?id=2"));

    assert!(Args::try_parse_from(["reel", "--cache", "sometimes"]).is_err());
  }

  #[test]
  fn search_prints_matches_in_order() {
    let text = output(Command::Search { term: "CA".to_string(), json: false }).unwrap();
    let cats = text.find("Cats").unwrap();
    let cars = text.find("Cars").unwrap();
    assert!(cats < cars);
    assert!(!text.contains("Dogs"));
    assert!(text.contains("2:10 · Animals"));
  }

  #[test]
  fn empty_search_prints_message() {
    let text = output(Command::Search { term: "submarine".to_string(), json: false }).unwrap();
    assert_eq!(text.trim(), "No videos found. Please try a different search.");
  }

  #[test]
  fn list_new_as_json() {
    let text = output(Command::List { new: true, json: true }).unwrap();
    let records: Vec<VideoRecord> = serde_json::from_str(&text).unwrap();
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(text.contains("\"videoUrl\""));
  }

  #[test]
  fn show_lists_related_without_descriptions() {
    let text = output(Command::Show { id: 1, json: false }).unwrap();
    let (detail, related) = text.split_once("Related videos:").unwrap();
    assert!(detail.contains("Whiskers"));
    assert!(related.contains("Dogs"));
    assert!(!related.contains("Paws"));

    let text = output(Command::Show { id: 3, json: false }).unwrap();
    assert!(text.contains("No related videos found."));
  }

  #[test]
  fn show_unknown_id_is_not_found() {
    let err = output(Command::Show { id: 42, json: false }).unwrap_err();
    assert_eq!(err.downcast_ref::<NotFoundError>(), Some(&NotFoundError { id: 42 }));
  }

  #[test]
  fn show_json_nests_related() {
    let text = output(Command::Show { id: 2, json: true }).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["video"]["id"], 2);
    assert_eq!(doc["related"][0]["id"], 1);
  }
}
