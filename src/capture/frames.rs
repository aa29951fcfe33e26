//! Frame sequence capture for tests and replays

use std::path::Path;

use image::GrayImage;

use super::{CaptureSource, Frame, Region};
use crate::error::{BotError, Result};

/// Replays a fixed sequence of frames in place of a live window.
///
/// Used by tests and offline replays: the bot loop runs unchanged
/// against recorded stills. The frame region pretends the sequence is a
/// window at the screen origin.
pub struct FrameSequenceCapture {
    frames: Vec<GrayImage>,
    index: usize,
    loop_playback: bool,
}

impl FrameSequenceCapture {
    /// Build a sequence from in-memory images
    pub fn from_images(frames: Vec<GrayImage>, loop_playback: bool) -> Result<Self> {
        if frames.is_empty() {
            return Err(BotError::Capture("empty frame sequence".into()));
        }
        Ok(Self {
            frames,
            index: 0,
            loop_playback,
        })
    }

    /// Load every PNG in a directory, in filename order
    pub fn from_directory(dir: impl AsRef<Path>, loop_playback: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| BotError::Capture(format!("frame directory {}: {e}", dir.display())))?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("png"))
            })
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let img = image::open(&path)
                .map_err(|e| BotError::Capture(format!("{}: {e}", path.display())))?
                .to_luma8();
            frames.push(img);
        }

        Self::from_images(frames, loop_playback)
    }

    /// Frames remaining before the sequence is exhausted
    pub fn remaining(&self) -> usize {
        if self.loop_playback {
            usize::MAX
        } else {
            self.frames.len().saturating_sub(self.index)
        }
    }
}

impl CaptureSource for FrameSequenceCapture {
    fn capture(&mut self) -> Result<Frame> {
        if self.index >= self.frames.len() {
            if self.loop_playback {
                self.index = 0;
            } else {
                return Err(BotError::Capture("frame sequence exhausted".into()));
            }
        }
        let gray = self.frames[self.index].clone();
        self.index += 1;
        let region = Region::new(0, 0, gray.width(), gray.height());
        Ok(Frame::new(gray, region))
    }

    fn is_available(&self) -> bool {
        self.loop_playback || self.index < self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_sequence_plays_in_order_then_exhausts() {
        let frames = vec![
            GrayImage::from_pixel(4, 4, Luma([1])),
            GrayImage::from_pixel(4, 4, Luma([2])),
        ];
        let mut capture = FrameSequenceCapture::from_images(frames, false).unwrap();

        assert_eq!(capture.capture().unwrap().gray.get_pixel(0, 0)[0], 1);
        assert_eq!(capture.capture().unwrap().gray.get_pixel(0, 0)[0], 2);
        assert!(matches!(capture.capture(), Err(BotError::Capture(_))));
        assert!(!capture.is_available());
    }

    #[test]
    fn test_sequence_loops_when_asked() {
        let frames = vec![GrayImage::from_pixel(4, 4, Luma([7]))];
        let mut capture = FrameSequenceCapture::from_images(frames, true).unwrap();

        for _ in 0..5 {
            assert_eq!(capture.capture().unwrap().gray.get_pixel(0, 0)[0], 7);
        }
        assert!(capture.is_available());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert!(FrameSequenceCapture::from_images(Vec::new(), false).is_err());
    }

    #[test]
    fn test_from_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(4, 4, Luma([2]))
            .save(dir.path().join("frame_002.png"))
            .unwrap();
        GrayImage::from_pixel(4, 4, Luma([1]))
            .save(dir.path().join("frame_001.png"))
            .unwrap();

        let mut capture = FrameSequenceCapture::from_directory(dir.path(), false).unwrap();
        assert_eq!(capture.capture().unwrap().gray.get_pixel(0, 0)[0], 1);
        assert_eq!(capture.capture().unwrap().gray.get_pixel(0, 0)[0], 2);
    }
}
