//! Import of machine-generated predictions for the verification screen.
//!
//! The file is a JSON object keyed by base image name. Each value is an
//! ordered list of boxes whose position and extent are fractions of the image
//! size, with `x`/`y` naming the box center.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use log::{info, warn};
use serde::Deserialize;

use crate::boxes::{Point, Rect};
use crate::error::{AppError, AppResult};
use crate::manifest::PhotoManifest;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Id(i64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Id(id) => write!(f, "{id}"),
            Label::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PredictionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: Label,
    /// Optional outline as fractional `[x, y]` pairs.
    #[serde(default)]
    pub segmentation: Option<Vec<[f64; 2]>>,
}

/// A prediction scaled onto a canvas: top-left rect in whole pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelPrediction {
    pub rect: Rect,
    pub label: Label,
    pub outline: Vec<Point>,
}

/// Halves round toward positive infinity, so -2.5 becomes -2.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

impl PredictionBox {
    pub fn to_pixels(&self, canvas_width: f64, canvas_height: f64) -> PixelPrediction {
        let w = self.width * canvas_width;
        let h = self.height * canvas_height;
        let x = self.x * canvas_width - w / 2.0;
        let y = self.y * canvas_height - h / 2.0;
        let outline = self
            .segmentation
            .iter()
            .flatten()
            .map(|[px, py]| Point::new(px * canvas_width, py * canvas_height))
            .collect();
        PixelPrediction {
            rect: Rect::new(round_half_up(x), round_half_up(y), round_half_up(w), round_half_up(h)),
            label: self.label.clone(),
            outline,
        }
    }
}

pub type PredictionFile = BTreeMap<String, Vec<PredictionBox>>;

pub fn parse_predictions(bytes: &[u8]) -> AppResult<PredictionFile> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| AppError::MalformedImport(e.to_string()))?;
    if !value.is_object() {
        return Err(AppError::MalformedImport(
            "expected an object keyed by image name".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| AppError::MalformedImport(e.to_string()))
}

/// One image's worth of predictions, with its photo located (or not).
#[derive(Clone, Debug)]
pub struct ImportedImage {
    pub key: String,
    pub image: Result<PathBuf, String>,
    pub predictions: Vec<PredictionBox>,
}

/// Pairs every key of `file` with its photo on disk.
///
/// Keys that cannot be located are kept, carrying the reason, so the screen
/// can report them instead of rendering a blank canvas.
pub fn resolve_images(
    file: PredictionFile,
    manifest: &PhotoManifest,
    photo_root: &std::path::Path,
) -> Vec<ImportedImage> {
    let imported: Vec<ImportedImage> = file
        .into_iter()
        .map(|(key, predictions)| {
            let image = manifest
                .resolve(&key)
                .map(|r| r.path(photo_root))
                .map_err(|e| e.to_string());
            ImportedImage {
                key,
                image,
                predictions,
            }
        })
        .collect();

    let missing = imported.iter().filter(|i| i.image.is_err()).count();
    if missing > 0 {
        warn!("{} of {} prediction keys could not be resolved", missing, imported.len());
    }
    info!("Imported predictions for {} images", imported.len());
    imported
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SAMPLE: &str = r#"{
        "siteA_2020_img1": [
            {"x": 0.5, "y": 0.5, "width": 0.2, "height": 0.4, "label": 3},
            {"x": 0.1, "y": 0.2, "width": 0.1, "height": 0.1, "label": "barnacle",
             "segmentation": [[0.25, 0.5], [0.3, 0.5], [0.25, 0.625]]}
        ],
        "siteZ_1999_img4": []
    }"#;

    #[test]
    fn parses_mixed_labels() {
        let file = parse_predictions(SAMPLE.as_bytes()).unwrap();
        let boxes = &file["siteA_2020_img1"];
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].label, Label::Id(3));
        assert_eq!(boxes[1].label, Label::Name("barnacle".into()));
        assert_eq!(boxes[1].label.to_string(), "barnacle");
        assert!(boxes[0].segmentation.is_none());
        assert_eq!(boxes[1].segmentation.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn converts_center_fractions_to_pixel_rect() {
        let file = parse_predictions(SAMPLE.as_bytes()).unwrap();
        let p = file["siteA_2020_img1"][0].to_pixels(1000.0, 750.0);
        assert_eq!(p.rect, Rect::new(400.0, 225.0, 200.0, 300.0));
        assert!(p.outline.is_empty());

        let seg = file["siteA_2020_img1"][1].to_pixels(1000.0, 750.0);
        assert_eq!(seg.rect, Rect::new(50.0, 113.0, 100.0, 75.0));
        assert_eq!(seg.outline[0], Point::new(250.0, 375.0));
    }

    #[test]
    fn halves_round_up_past_the_edge() {
        let p = PredictionBox {
            x: 0.0,
            y: 0.0,
            width: 0.005,
            height: 0.01,
            label: Label::Id(1),
            segmentation: None,
        };
        let px = p.to_pixels(1000.0, 750.0);
        assert_eq!(px.rect.x, -2.0);
        assert_eq!(px.rect.width, 5.0);
        assert_eq!(px.rect.y, -4.0);
        assert_eq!(px.rect.height, 8.0);
    }

    #[test]
    fn invalid_json_is_malformed_import() {
        assert!(matches!(
            parse_predictions(b"{not json"),
            Err(AppError::MalformedImport(_))
        ));
    }

    #[test]
    fn wrong_shape_is_malformed_import() {
        for bad in [
            r#"[1, 2, 3]"#,
            r#"{"img": {"x": 1}}"#,
            r#"{"img": [{"x": 0.1, "y": 0.1, "width": 0.1}]}"#,
            r#""just a string""#,
        ] {
            assert!(
                matches!(parse_predictions(bad.as_bytes()), Err(AppError::MalformedImport(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn unresolved_keys_are_kept_with_reason() {
        let manifest = PhotoManifest::from_folders(
            [("siteA_2020".to_string(), vec!["img1.jpg".to_string()])]
                .into_iter()
                .collect(),
        );
        let file = parse_predictions(SAMPLE.as_bytes()).unwrap();
        let imported = resolve_images(file, &manifest, Path::new("/photos"));
        assert_eq!(imported.len(), 2);
        assert_eq!(
            imported[0].image,
            Ok(PathBuf::from("/photos/siteA_2020/img1.jpg"))
        );
        assert_eq!(imported[1].key, "siteZ_1999_img4");
        assert!(imported[1].image.as_ref().unwrap_err().contains("siteZ_1999_img4"));
    }
}
