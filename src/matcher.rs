//! Template matching over captured frames
//!
//! Normalized cross-correlation, one best location per template. A
//! template that never reaches its threshold produces no result at
//! all, so downstream consumers only ever see matches worth acting on.

use image::imageops;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::config::RegionConfig;
use crate::template::{Template, TemplateLibrary};

/// Axis-aligned rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the rectangle
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Best-scoring location of one template within one frame
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Template key this result belongs to
    pub key: String,
    /// Confidence in `[0, 1]`
    pub score: f32,
    /// Where the template matched, in frame coordinates
    pub location: Rect,
}

/// Match every library template against the frame.
///
/// Pure function of its inputs; results below each template's threshold
/// are omitted rather than reported as weak matches.
pub fn match_frame(frame: &Frame, library: &TemplateLibrary) -> Vec<MatchResult> {
    library
        .iter()
        .filter_map(|template| match_one(frame, template))
        .collect()
}

/// Match a single template, honoring its search region if it has one
pub fn match_one(frame: &Frame, template: &Template) -> Option<MatchResult> {
    let (tw, th) = template.image().dimensions();
    if tw == 0 || th == 0 {
        return None;
    }

    let (offset_x, offset_y, scores) = match template.region() {
        Some(region) => {
            let (rx, ry, rw, rh) = region_pixels(region, frame.width(), frame.height());
            if rw < tw || rh < th {
                return None;
            }
            let view = imageops::crop_imm(&frame.gray, rx, ry, rw, rh).to_image();
            let scores = match_template(
                &view,
                template.image(),
                MatchTemplateMethod::CrossCorrelationNormalized,
            );
            (rx, ry, scores)
        }
        None => {
            if frame.width() < tw || frame.height() < th {
                return None;
            }
            let scores = match_template(
                &frame.gray,
                template.image(),
                MatchTemplateMethod::CrossCorrelationNormalized,
            );
            (0, 0, scores)
        }
    };

    let extremes = find_extremes(&scores);
    let score = extremes.max_value.clamp(0.0, 1.0);
    if score < template.threshold() {
        return None;
    }

    let (mx, my) = extremes.max_value_location;
    Some(MatchResult {
        key: template.key().to_string(),
        score,
        location: Rect::new(offset_x + mx, offset_y + my, tw, th),
    })
}

/// Pixel bounds of a fractional region within a frame
fn region_pixels(region: &RegionConfig, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let r = region.clamped();
    let x0 = (width as f32 * r.left) as u32;
    let y0 = (height as f32 * r.top) as u32;
    let x1 = ((width as f32 * r.right) as u32).min(width);
    let y1 = ((height as f32 * r.bottom) as u32).min(height);
    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Region;
    use image::{GrayImage, Luma};

    const BG: u8 = 40;

    /// Vertical stripes: odd columns bright. Near-orthogonal to both a
    /// flat background and the horizontal variant, so cross-scores stay
    /// well below the 0.8 thresholds used here.
    fn vertical_stripes(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| {
            if x % 2 == 1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Horizontal stripes: odd rows bright
    fn horizontal_stripes(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |_, y| {
            if y % 2 == 1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn blit(frame: &mut GrayImage, patch: &GrayImage, x: u32, y: u32) {
        for (px, py, pixel) in patch.enumerate_pixels() {
            frame.put_pixel(x + px, y + py, *pixel);
        }
    }

    fn frame_with(patches: &[(&GrayImage, u32, u32)]) -> Frame {
        let mut img = GrayImage::from_pixel(64, 64, Luma([BG]));
        for (patch, x, y) in patches {
            blit(&mut img, patch, *x, *y);
        }
        Frame::new(img, Region::new(0, 0, 64, 64))
    }

    #[test]
    fn test_exact_match_scores_near_one_at_location() {
        let tpl_img = vertical_stripes(8, 8);
        let frame = frame_with(&[(&tpl_img, 10, 20)]);
        let template = Template::new("stripes_v", tpl_img, 0.8);

        let hit = match_one(&frame, &template).expect("template present");
        assert!(hit.score > 0.99, "score {}", hit.score);
        assert_eq!((hit.location.x, hit.location.y), (10, 20));
        assert_eq!(hit.location.center(), (14, 24));
    }

    #[test]
    fn test_absent_template_is_omitted() {
        let frame = frame_with(&[]);
        let template = Template::new("stripes_v", vertical_stripes(8, 8), 0.8);
        assert!(match_one(&frame, &template).is_none());
    }

    #[test]
    fn test_no_result_below_threshold() {
        // The frame only holds the horizontal pattern; the vertical
        // template correlates weakly everywhere.
        let horizontal = horizontal_stripes(8, 8);
        let frame = frame_with(&[(&horizontal, 10, 20)]);
        let template = Template::new("stripes_v", vertical_stripes(8, 8), 0.8);
        assert!(match_one(&frame, &template).is_none());
    }

    #[test]
    fn test_results_never_fall_below_threshold() {
        let v = vertical_stripes(8, 8);
        let h = horizontal_stripes(8, 8);
        let frame = frame_with(&[(&v, 4, 4)]);

        let library = TemplateLibrary::from_templates([
            Template::new("stripes_v", v.clone(), 0.8),
            Template::new("stripes_h", h.clone(), 0.8),
        ])
        .unwrap();

        let results = match_frame(&frame, &library);
        assert_eq!(results.len(), 1);
        for result in &results {
            let threshold = library.get(&result.key).unwrap().threshold();
            assert!(result.score >= threshold);
        }
    }

    #[test]
    fn test_region_restricts_search() {
        let v = vertical_stripes(8, 8);
        let frame = frame_with(&[(&v, 40, 40)]);

        // Patch sits in the bottom-right quadrant; a top-left region
        // must not see it.
        let top_left = Template::new("stripes_v", v.clone(), 0.8)
            .with_region(RegionConfig::new(0.0, 0.0, 0.5, 0.5));
        assert!(match_one(&frame, &top_left).is_none());

        let bottom_right = Template::new("stripes_v", v, 0.8)
            .with_region(RegionConfig::new(0.5, 0.5, 1.0, 1.0));
        let hit = match_one(&frame, &bottom_right).expect("patch inside region");
        // Location is reported in full-frame coordinates
        assert_eq!((hit.location.x, hit.location.y), (40, 40));
    }

    #[test]
    fn test_template_larger_than_frame_is_skipped() {
        let frame = frame_with(&[]);
        let template = Template::new("huge", vertical_stripes(128, 128), 0.5);
        assert!(match_one(&frame, &template).is_none());
    }

    #[test]
    fn test_region_smaller_than_template_is_skipped() {
        let v = vertical_stripes(8, 8);
        let frame = frame_with(&[(&v, 0, 0)]);
        let template = Template::new("stripes_v", v, 0.5)
            .with_region(RegionConfig::new(0.0, 0.0, 0.05, 0.05));
        assert!(match_one(&frame, &template).is_none());
    }

    #[test]
    fn test_match_frame_reports_each_present_template_once() {
        let v = vertical_stripes(8, 8);
        let h = horizontal_stripes(8, 8);
        let frame = frame_with(&[(&v, 4, 4), (&h, 40, 40)]);

        let library = TemplateLibrary::from_templates([
            Template::new("stripes_v", v, 0.8),
            Template::new("stripes_h", h, 0.8),
        ])
        .unwrap();

        let mut keys: Vec<_> = match_frame(&frame, &library)
            .into_iter()
            .map(|m| m.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["stripes_h", "stripes_v"]);
    }
}
