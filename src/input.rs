use anyhow::{Context, Result};
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::route::Route;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return Ok(());
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return Ok(());
      }
      KeyCode::Char('s') => {
        app.stop_playback().await.context("Failed to stop playback")?;
        return Ok(());
      }
      KeyCode::Char('o') => {
        app.open_current_in_browser();
        return Ok(());
      }
      KeyCode::Char('r') => {
        app.trigger_load();
        return Ok(());
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => match app.route {
      Route::Home => handle_home_key(app, key),
      Route::Detail(_) => handle_detail_key(app, key).await,
    },
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter | KeyCode::Down | KeyCode::Tab => {
      if app.catalog().is_some() {
        app.mode = AppMode::Results;
      }
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.search_changed();
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.search_changed();
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.search_changed();
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        clear_search(app);
      } else if app.catalog().is_some() {
        app.mode = AppMode::Results;
      } else {
        app.should_quit = true;
      }
    }
    _ => {}
  }
}

fn clear_search(app: &mut App) {
  app.input.clear();
  app.cursor_position = 0;
  app.input_scroll = 0;
  app.search_changed();
}

fn handle_home_key(app: &mut App, key: event::KeyEvent) {
  let count = app.home_view().map_or(0, |v| v.len());
  match key.code {
    KeyCode::Enter => app.open_selected(),
    KeyCode::Right | KeyCode::Char('l') => app.grid.move_by(1, 0, count),
    KeyCode::Left | KeyCode::Char('h') => app.grid.move_by(-1, 0, count),
    KeyCode::Down | KeyCode::Char('j') => app.grid.move_by(0, 1, count),
    KeyCode::Up | KeyCode::Char('k') => {
      if app.grid.selected < app.grid.columns.max(1) {
        app.mode = AppMode::Input;
      } else {
        app.grid.move_by(0, -1, count);
      }
    }
    KeyCode::Char(c @ '1'..='9') => {
      if let Some(idx) = c.to_digit(10) {
        app.open_newest(idx as usize - 1);
      }
    }
    KeyCode::Char('/') => app.mode = AppMode::Input,
    KeyCode::Char('r') => app.trigger_load(),
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Esc => {
      if !app.input.is_empty() {
        clear_search(app);
      } else {
        app.mode = AppMode::Input;
      }
    }
    _ => {}
  }
}

async fn handle_detail_key(app: &mut App, key: event::KeyEvent) {
  let count = app.related_view().map_or(0, |v| v.len());
  match key.code {
    KeyCode::Enter => app.open_selected(),
    KeyCode::Right | KeyCode::Char('l') | KeyCode::Down | KeyCode::Char('j') => app.related_grid.move_by(1, 0, count),
    KeyCode::Left | KeyCode::Char('h') | KeyCode::Up | KeyCode::Char('k') => app.related_grid.move_by(-1, 0, count),
    KeyCode::Char('p') | KeyCode::Char(' ') => app.play_current().await,
    KeyCode::Char('o') => app.open_current_in_browser(),
    KeyCode::Char('r') => app.trigger_load(),
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Char('/') => {
      app.navigate(Route::Home);
      app.mode = AppMode::Input;
    }
    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
      app.go_back();
    }
    _ => {}
  }
}
