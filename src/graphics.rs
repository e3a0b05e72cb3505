use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::debug;

use crate::constants::constants;
use crate::display::DisplayMode;
use crate::loader::Location;

// --- Thumbnail Widget ---

pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
  /// Text drawn over the image center, used for the placeholder.
  pub label: Option<&'a str>,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => {
        let resized = self.image.resize_to_fill(area.width as u32, area.height as u32 * 2, FilterType::Triangle);
        render_direct(&resized, area, buf);
      }
      DisplayMode::Ascii => {
        let resized = self.image.resize_to_fill(area.width as u32, area.height as u32, FilterType::Triangle);
        render_ascii(&resized, area, buf);
      }
    }
    if let Some(label) = self.label {
      let width = unicode_width::UnicodeWidthStr::width(label).min(area.width as usize) as u16;
      let x = area.x + (area.width - width) / 2;
      let y = area.y + area.height / 2;
      buf.set_stringn(x, y, label, width as usize, Style::default().fg(Color::Rgb(148, 160, 171)));
    }
  }
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let img_w = rgb.width().min(area.width as u32);
  let img_h = rgb.height();
  let cell_h = img_h.div_ceil(2).min(area.height as u32);

  for y in 0..cell_h {
    for x in 0..img_w {
      let upper = rgb.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = rgb.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(area.x + x as u16, area.y + y as u16, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let img_w = luma.width().min(area.width as u32);
  let img_h = luma.height().min(area.height as u32);

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = luma.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      let idx = idx.min(ASCII_CHARS.len() - 1);
      buf.set_string(area.x + x as u16, area.y + y as u16, ASCII_CHARS[idx], Style::default());
    }
  }
}

// --- Thumbnails ---

/// Stand-in for a missing or broken thumbnail: a pale 16:9 card with a darker frame.
pub fn placeholder_thumbnail() -> DynamicImage {
  let (w, h) = (constants().thumbnail_max_width, constants().thumbnail_max_height);
  let fill = Rgb([247, 250, 252]);
  let frame = Rgb([203, 213, 224]);
  let image = RgbImage::from_fn(w, h, |x, y| {
    let edge = x < 2 || y < 2 || x + 2 >= w || y + 2 >= h;
    if edge { frame } else { fill }
  });
  DynamicImage::ImageRgb8(image)
}

/// Shrink a decoded thumbnail so per-frame resizing stays cheap.
fn shrink(image: DynamicImage) -> DynamicImage {
  let c = constants();
  if image.width() <= c.thumbnail_max_width && image.height() <= c.thumbnail_max_height {
    return image;
  }
  image.thumbnail(c.thumbnail_max_width, c.thumbnail_max_height)
}

/// Fetch and decode the image at `location`.
pub async fn load_thumbnail(client: &Client, location: &Location) -> Result<DynamicImage> {
  let bytes = match location {
    Location::Remote(url) => {
      let response = client.get(url.clone()).send().await.with_context(|| format!("Failed to fetch {}", url))?;
      if !response.status().is_success() {
        return Err(anyhow!("{} returned HTTP {}", url, response.status()));
      }
      response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?.to_vec()
    }
    Location::File(path) => {
      tokio::fs::read(path).await.with_context(|| format!("Failed to read {}", path.display()))?
    }
  };
  let image =
    image::load_from_memory(&bytes).with_context(|| format!("Failed to decode image from memory ({})", location))?;
  Ok(shrink(image))
}

/// A thumbnail to fetch for the record `id`.
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
  pub id: i64,
  pub location: Location,
}

/// Fetch thumbnails with bounded concurrency, sending each one through `tx` as it decodes.
/// Failures are logged and skipped; the renderer keeps showing the placeholder for them.
pub async fn fetch_thumbnails(client: Client, jobs: Vec<ThumbnailJob>, tx: mpsc::Sender<(i64, DynamicImage)>) {
  use futures::stream::{self, StreamExt};

  stream::iter(jobs)
    .map(|job| {
      let client = client.clone();
      let tx = tx.clone();
      async move {
        match load_thumbnail(&client, &job.location).await {
          Ok(image) => {
            let _ = tx.send((job.id, image)).await;
          }
          Err(e) => {
            let err = format!("{:#}", e);
            debug!(id = job.id, err = %err, "thumbnail unavailable, using placeholder");
          }
        }
      }
    })
    .buffer_unordered(constants().thumbnail_concurrency.max(1))
    .collect::<()>()
    .await;
}
