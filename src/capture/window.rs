//! Window capture over xcap

use image::DynamicImage;

use super::{CaptureSource, Frame, Region};
use crate::error::{BotError, Result};

/// Captures the game window identified by a title substring.
///
/// The binding is re-established lazily: a stale or closed window
/// surfaces as `WindowNotFound`, and the next capture attempt
/// re-enumerates. The binding survives a stop so a quick restart does
/// not need a re-pick.
pub struct WindowCapture {
    title: String,
    window: Option<xcap::Window>,
}

impl WindowCapture {
    /// Bind to the first window whose title contains `title`
    pub fn bind(title: impl Into<String>) -> Result<Self> {
        let mut capture = Self {
            title: title.into(),
            window: None,
        };
        capture.rebind()?;
        Ok(capture)
    }

    /// Title substring this capture is bound to
    pub fn title(&self) -> &str {
        &self.title
    }

    fn rebind(&mut self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(BotError::ConfigInvalid("empty window title".into()));
        }

        let windows = xcap::Window::all()
            .map_err(|e| BotError::Capture(format!("window enumeration failed: {e}")))?;

        let window = windows
            .into_iter()
            .find(|w| {
                w.title()
                    .map(|t| t.contains(&self.title))
                    .unwrap_or(false)
            })
            .ok_or_else(|| BotError::WindowNotFound(self.title.clone()))?;

        if let Ok(title) = window.title() {
            log::info!("Bound window '{}'", title);
        }
        self.window = Some(window);
        Ok(())
    }

    fn geometry(window: &xcap::Window) -> Result<Region> {
        let x = window
            .x()
            .map_err(|e| BotError::Capture(format!("window geometry: {e}")))?;
        let y = window
            .y()
            .map_err(|e| BotError::Capture(format!("window geometry: {e}")))?;
        let width = window
            .width()
            .map_err(|e| BotError::Capture(format!("window geometry: {e}")))?;
        let height = window
            .height()
            .map_err(|e| BotError::Capture(format!("window geometry: {e}")))?;
        if width == 0 || height == 0 {
            return Err(BotError::Capture("window has zero area".into()));
        }
        Ok(Region::new(x, y, width, height))
    }
}

impl CaptureSource for WindowCapture {
    fn capture(&mut self) -> Result<Frame> {
        if self.window.is_none() {
            self.rebind()?;
        }
        let window = self.window.as_ref().expect("bound above");

        // A closed window shows up as a failing accessor; drop the
        // binding so the next attempt re-enumerates.
        let minimized = match window.is_minimized() {
            Ok(m) => m,
            Err(_) => {
                self.window = None;
                return Err(BotError::WindowNotFound(self.title.clone()));
            }
        };
        if minimized {
            return Err(BotError::Capture("window is minimized".into()));
        }

        let region = Self::geometry(window)?;
        let rgba = match window.capture_image() {
            Ok(img) => img,
            Err(e) => {
                return Err(BotError::Capture(format!("capture failed: {e}")));
            }
        };

        let gray = DynamicImage::ImageRgba8(rgba).to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(BotError::Capture("empty capture".into()));
        }

        Ok(Frame::new(gray, region))
    }

    fn is_available(&self) -> bool {
        self.window.is_some()
    }
}
