//! Template library
//!
//! Reference images for the maze screens, loaded from a folder of PNGs.
//! The file stem is the template key. A library is immutable once
//! loaded; a reload builds a fresh library that the bot swaps in at a
//! safe boundary, so readers never observe a half-updated set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::config::{BotConfig, RegionConfig};
use crate::error::{BotError, Result};

/// A single reference image with its effective match settings
#[derive(Debug, Clone)]
pub struct Template {
    key: String,
    image: GrayImage,
    threshold: f32,
    region: Option<RegionConfig>,
}

impl Template {
    /// Build a template directly; used by tests and by the loader
    pub fn new(key: impl Into<String>, image: GrayImage, threshold: f32) -> Self {
        Self {
            key: key.into(),
            image,
            threshold: threshold.clamp(0.0, 1.0),
            region: None,
        }
    }

    /// Restrict matching to a fractional region of the frame
    pub fn with_region(mut self, region: RegionConfig) -> Self {
        self.region = Some(region.clamped());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Effective detection threshold, always in `[0, 1]`
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn region(&self) -> Option<&RegionConfig> {
        self.region.as_ref()
    }
}

/// Immutable, keyed set of templates for one run
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Template>,
    dir: PathBuf,
}

impl TemplateLibrary {
    /// Scan `dir` for PNG files and load them as grayscale templates.
    ///
    /// Thresholds and regions come from the config: per-key overrides
    /// first, the main threshold otherwise. Fails on a missing
    /// directory, an unreadable file, or a duplicate/empty key.
    pub fn load(dir: impl AsRef<Path>, config: &BotConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            BotError::TemplateLoad(format!("template directory {}: {e}", dir.display()))
        })?;

        let mut templates = BTreeMap::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| BotError::TemplateLoad(format!("reading {}: {e}", dir.display())))?;
            let path = entry.path();
            if !is_png(&path) {
                continue;
            }

            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    BotError::TemplateLoad(format!("malformed template filename {}", path.display()))
                })?;

            let image = image::open(&path)
                .map_err(|e| BotError::TemplateLoad(format!("{}: {e}", path.display())))?
                .to_luma8();

            let threshold = config
                .template_thresholds
                .get(&key)
                .copied()
                .unwrap_or(config.main_threshold);

            let mut template = Template::new(key.clone(), image, threshold);
            if let Some(region) = config.template_regions.get(&key) {
                template = template.with_region(*region);
            }

            if templates.insert(key.clone(), template).is_some() {
                return Err(BotError::DuplicateTemplate(key));
            }
        }

        log::info!(
            "Loaded {} templates from {}",
            templates.len(),
            dir.display()
        );

        Ok(Self {
            templates,
            dir: dir.to_path_buf(),
        })
    }

    /// Build a library from pre-made templates; used by tests
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for template in templates {
            let key = template.key().to_string();
            if map.insert(key.clone(), template).is_some() {
                return Err(BotError::DuplicateTemplate(key));
            }
        }
        Ok(Self {
            templates: map,
            dir: PathBuf::new(),
        })
    }

    /// Look up a template by key
    pub fn get(&self, key: &str) -> Result<&Template> {
        self.templates
            .get(key)
            .ok_or_else(|| BotError::UnknownTemplate(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    /// Keys in stable (sorted) order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Templates in stable key order
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Directory this library was loaded from
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn write_png(dir: &Path, name: &str, value: u8) {
        let img = GrayImage::from_pixel(8, 8, Luma([value]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_load_scans_png_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "btn_next.png", 10);
        write_png(dir.path(), "title_route.png", 20);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config = BotConfig::default();
        let library = TemplateLibrary::load(dir.path(), &config).unwrap();

        assert_eq!(library.len(), 2);
        assert!(library.contains("btn_next"));
        assert!(library.contains("title_route"));
        assert!(!library.contains("notes"));
    }

    #[test]
    fn test_missing_directory_is_load_error() {
        let config = BotConfig::default();
        let err = TemplateLibrary::load("/nonexistent/templates", &config).unwrap_err();
        assert!(matches!(err, BotError::TemplateLoad(_)));
    }

    #[test]
    fn test_unknown_key() {
        let library = TemplateLibrary::from_templates(Vec::new()).unwrap();
        assert!(matches!(
            library.get("btn_next"),
            Err(BotError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_threshold_override_and_clamp() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "tag_select.png", 10);
        write_png(dir.path(), "btn_next.png", 20);

        let mut config = BotConfig::default();
        config.main_threshold = 0.76;
        config
            .template_thresholds
            .insert("tag_select".into(), 0.77);

        let library = TemplateLibrary::load(dir.path(), &config).unwrap();
        assert_eq!(library.get("tag_select").unwrap().threshold(), 0.77);
        assert_eq!(library.get("btn_next").unwrap().threshold(), 0.76);

        // Construction clamps out-of-range thresholds
        let t = Template::new("x", GrayImage::new(2, 2), 1.7);
        assert_eq!(t.threshold(), 1.0);
    }

    #[test]
    fn test_reload_unchanged_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "event_boss.png", 40);
        write_png(dir.path(), "event_battle.png", 80);

        let config = BotConfig::default();
        let first = TemplateLibrary::load(dir.path(), &config).unwrap();
        let second = TemplateLibrary::load(dir.path(), &config).unwrap();

        let keys_a: Vec<_> = first.keys().collect();
        let keys_b: Vec<_> = second.keys().collect();
        assert_eq!(keys_a, keys_b);
        for key in first.keys() {
            let a = first.get(key).unwrap();
            let b = second.get(key).unwrap();
            assert_eq!(a.image().as_raw(), b.image().as_raw());
            assert_eq!(a.threshold(), b.threshold());
        }
    }

    #[test]
    fn test_reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "event_boss.png", 40);

        let config = BotConfig::default();
        let before = TemplateLibrary::load(dir.path(), &config).unwrap();
        assert_eq!(before.len(), 1);

        write_png(dir.path(), "event_shop.png", 90);
        let after = TemplateLibrary::load(dir.path(), &config).unwrap();
        assert_eq!(after.len(), 2);
        assert!(after.contains("event_shop"));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let a = Template::new("btn_next", GrayImage::new(2, 2), 0.8);
        let b = Template::new("btn_next", GrayImage::new(4, 4), 0.8);
        let err = TemplateLibrary::from_templates([a, b]).unwrap_err();
        assert!(matches!(err, BotError::DuplicateTemplate(k) if k == "btn_next"));
    }

    #[test]
    fn test_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

        let config = BotConfig::default();
        let err = TemplateLibrary::load(dir.path(), &config).unwrap_err();
        assert!(matches!(err, BotError::TemplateLoad(_)));
    }
}
