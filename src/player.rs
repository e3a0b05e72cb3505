use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::process::{Child as TokioChild, Command};
use tracing::{info, warn};

/// What the external player is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
  pub id: i64,
  pub title: String,
  pub target: String,
}

/// Hands video URLs to an external player process, one at a time.
pub struct VideoPlayer {
  command: String,
  current_process: Option<TokioChild>,
  pub now_playing: Option<NowPlaying>,
}

/// Split a configured command line into program and leading arguments.
fn split_command(command: &str) -> Option<(&str, Vec<&str>)> {
  let mut parts = command.split_whitespace();
  let program = parts.next()?;
  Some((program, parts.collect()))
}

impl VideoPlayer {
  pub fn new(command: impl Into<String>) -> Self {
    Self { command: command.into(), current_process: None, now_playing: None }
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub async fn play(&mut self, now_playing: NowPlaying) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;

    let (program, args) = split_command(&self.command).ok_or_else(|| anyhow!("No player command configured"))?;
    let mut cmd = Command::new(program);
    cmd.args(&args).arg(&now_playing.target);
    cmd.stdin(Stdio::null());
    // The TUI owns the terminal; the player must not write into it.
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("{} not found. Install it or set `player` in prefs.toml", program)
      } else {
        anyhow!(e).context(format!("Failed to spawn {}", program))
      }
    })?;

    info!(id = now_playing.id, target = %now_playing.target, player = program, "playback started");
    self.current_process = Some(child);
    self.now_playing = Some(now_playing);
    Ok(())
  }

  /// Notice a player that exited on its own. Returns true when that just happened.
  pub fn reap(&mut self) -> bool {
    let Some(child) = self.current_process.as_mut() else { return false };
    match child.try_wait() {
      Ok(Some(status)) => {
        info!(code = ?status.code(), "player exited");
        self.current_process = None;
        self.now_playing = None;
        true
      }
      Ok(None) => false,
      Err(e) => {
        warn!(err = %e, "failed to poll player process");
        false
      }
    }
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill player process")?;
      let _ = child.wait().await;
    }
    self.now_playing = None;
    Ok(())
  }
}

/// Open `target` with the platform's default handler (browser for URLs).
pub fn open_external(target: &str) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(target)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to run {}", cmd))?;
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}
