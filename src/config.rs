use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::export::BoxCache;
use crate::render::Rgb;

const APP_DIR: &str = "tide-annotate";

/// Settings read from `settings.yaml`. Every field has a default so a
/// partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding one sub-folder per survey site.
    #[serde(default = "default_photo_root")]
    pub photo_root: PathBuf,

    /// Manifest written by `tide-annotate index`.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Where in-progress boxes are cached; defaults to the user cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub cache_boxes: bool,

    /// Starting directory for save dialogs.
    #[serde(default)]
    pub export_dir: Option<PathBuf>,

    /// Pixel size photos are shown at while drawing.
    #[serde(default = "default_draw_canvas")]
    pub draw_canvas: [u32; 2],

    /// Pixel size of each canvas on the verification screen.
    #[serde(default = "default_verify_canvas")]
    pub verify_canvas: [u32; 2],

    /// Names offered in the class picker; export uses the 0-based position.
    #[serde(default = "default_class_labels")]
    pub class_labels: Vec<String>,

    /// Folders skipped by `tide-annotate index`.
    #[serde(default = "default_ignore_folders")]
    pub ignore_folders: Vec<String>,

    /// Stroke color of the hovered prediction.
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,

    #[serde(default = "default_window_size")]
    pub window_size: [f32; 2],
}

fn default_photo_root() -> PathBuf {
    PathBuf::from("photos")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_true() -> bool {
    true
}

fn default_draw_canvas() -> [u32; 2] {
    [1024, 768]
}

fn default_verify_canvas() -> [u32; 2] {
    [1000, 750]
}

fn default_class_labels() -> Vec<String> {
    (1..=25).map(|i| i.to_string()).collect()
}

fn default_ignore_folders() -> Vec<String> {
    vec!["1_AnimationStartEndSlides".to_string()]
}

fn default_highlight_color() -> String {
    "#ffff00".to_string()
}

fn default_window_size() -> [f32; 2] {
    [1280.0, 900.0]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            photo_root: default_photo_root(),
            manifest: default_manifest(),
            cache_dir: None,
            cache_boxes: true,
            export_dir: None,
            draw_canvas: default_draw_canvas(),
            verify_canvas: default_verify_canvas(),
            class_labels: default_class_labels(),
            ignore_folders: default_ignore_folders(),
            highlight_color: default_highlight_color(),
            window_size: default_window_size(),
        }
    }
}

impl Settings {
    /// On Linux: ~/.config/tide-annotate/settings.yaml
    pub fn settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.yaml")
    }

    /// Loads settings, falling back to defaults when the file is missing,
    /// unreadable or invalid.
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::read(&path) {
            Ok(settings) => {
                info!("Loaded settings from {:?}", path);
                debug!("Settings: {:?}", settings);
                settings
            }
            Err(e) => {
                error!("Failed to load settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> AppResult<Self> {
        let settings: Settings = serde_yaml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, [w, h]) in [("draw_canvas", self.draw_canvas), ("verify_canvas", self.verify_canvas)] {
            if w == 0 || h == 0 {
                return Err(AppError::Config(format!("{name} must be non-zero, got {w}x{h}")));
            }
        }
        if self.class_labels.is_empty() {
            return Err(AppError::Config("class_labels must not be empty".into()));
        }
        self.highlight()?;
        Ok(())
    }

    pub fn highlight(&self) -> AppResult<Rgb> {
        Rgb::from_hex(&self.highlight_color)
    }

    pub fn box_cache(&self) -> BoxCache {
        if !self.cache_boxes {
            return BoxCache::disabled();
        }
        let dir = self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("boxes")
        });
        BoxCache::new(dir)
    }

    pub fn photo_path(&self, folder: &str, file: &str) -> PathBuf {
        self.photo_root.join(folder).join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_survey_setup() {
        let s = Settings::default();
        assert_eq!(s.draw_canvas, [1024, 768]);
        assert_eq!(s.verify_canvas, [1000, 750]);
        assert_eq!(s.class_labels.len(), 25);
        assert_eq!(s.class_labels[0], "1");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let s = Settings::from_yaml("photo_root: /data/pics\ncache_boxes: false\n").unwrap();
        assert_eq!(s.photo_root, PathBuf::from("/data/pics"));
        assert!(!s.cache_boxes);
        assert_eq!(s.manifest, PathBuf::from("data.json"));
        assert_eq!(s.verify_canvas, [1000, 750]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Settings::from_yaml("draw_canvas: [0, 768]\n"),
            Err(AppError::Config(_))
        ));
        assert!(Settings::from_yaml("class_labels: []\n").is_err());
        assert!(Settings::from_yaml("highlight_color: yellow\n").is_err());
        assert!(matches!(
            Settings::from_yaml("draw_canvas: nope\n"),
            Err(AppError::Yaml(_))
        ));
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "verify_canvas: [0, 0]\n").unwrap();
        assert_eq!(Settings::load(Some(&path)), Settings::default());

        fs::write(&path, "class_labels: [mussel, barnacle]\n").unwrap();
        let s = Settings::load(Some(&path));
        assert_eq!(s.class_labels, vec!["mussel", "barnacle"]);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load(Some(&dir.path().join("absent.yaml"))),
            Settings::default()
        );
    }

    #[test]
    fn disabled_cache_setting() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings {
            cache_boxes: false,
            cache_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let cache = s.box_cache();
        cache
            .store("a.jpg", &[crate::boxes::create_box(
                crate::boxes::Point::new(0.0, 0.0),
                crate::boxes::Point::new(1.0, 1.0),
                1,
            )])
            .unwrap();
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
