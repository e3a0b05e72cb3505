mod app;
mod catalog;
mod cli;
mod config;
mod constants;
mod display;
mod error;
mod graphics;
mod input;
mod loader;
mod logging;
mod player;
mod route;
mod theme;
mod ui;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::{error, info};

use app::App;
use cli::Args;
use config::{Config, Settings};
use loader::CatalogLoader;
use route::Route;

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let config = Config::load();
  let settings = Settings::resolve(&config, &args.overrides())?;

  if let Some(command) = args.command {
    logging::init_stderr_logging()?;
    return cli::run(command, &settings).await;
  }

  let _log_guard = logging::init_file_logging()?;
  info!(
    version = env!("CARGO_PKG_VERSION"),
    source = %settings.source,
    shape = settings.loader.shape.label(),
    cache = settings.loader.cache_mode.label(),
    "starting"
  );

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let route = args.open.as_deref().map_or(Route::Home, Route::parse);
  let mut terminal = ratatui::init();
  let result = run(&mut terminal, settings, route).await;
  ratatui::restore();
  if let Err(ref e) = result {
    let err = format!("{:#}", e);
    error!(err = %err, "exiting with error");
  }
  result
}

async fn run(terminal: &mut DefaultTerminal, settings: Settings, route: Route) -> Result<()> {
  let display_mode = display::resolve_display_mode(settings.display_mode);
  info!(mode = display_mode.label(), "thumbnail display mode");
  let loader = CatalogLoader::new(settings.loader).context("Failed to set up the catalog loader")?;
  let mut app = App::new(&settings, loader, display_mode, route);
  app.trigger_load();

  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await
}
