use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::boxes::{to_normalized, LabeledBox};
use crate::error::AppResult;
use crate::manifest::file_stem;

// ── Label export ────────────────────────────────────────────────────────────

/// One line per box: `class x y width height`, where x/y are the center
/// divided by the image size and width/height are pixels.
pub fn export_lines(boxes: &[LabeledBox], image_width: f64, image_height: f64) -> AppResult<String> {
    let lines = boxes
        .iter()
        .map(|b| {
            let n = to_normalized(b, image_width, image_height)?;
            Ok(format!("{} {} {} {} {}", n.class_index, n.x, n.y, n.width, n.height))
        })
        .collect::<AppResult<Vec<String>>>()?;
    Ok(lines.join("\n"))
}

pub fn export_file_name(image_name: &str) -> String {
    format!("{}.txt", file_stem(image_name))
}

pub fn save_export(path: &Path, contents: &str) -> AppResult<()> {
    fs::write(path, contents)?;
    info!("Exported labels to {}", path.display());
    Ok(())
}

// ── Box cache ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CacheFile {
    boxes: Vec<LabeledBox>,
}

fn read_cache_file(path: &Path) -> AppResult<CacheFile> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Boxes in progress, one JSON file per image name.
///
/// Reads happen when a photo is opened for drawing; every create or undo
/// writes the full list back.
#[derive(Clone, Debug)]
pub struct BoxCache {
    dir: Option<PathBuf>,
}

impl BoxCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    fn entry_path(&self, image_name: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{image_name}.boxes.json")))
    }

    pub fn load(&self, image_name: &str) -> Vec<LabeledBox> {
        let Some(path) = self.entry_path(image_name) else {
            return Vec::new();
        };
        if !path.exists() {
            return Vec::new();
        }
        match read_cache_file(&path) {
            Ok(file) => {
                debug!("Restored {} boxes for {}", file.boxes.len(), image_name);
                file.boxes
            }
            Err(e) => {
                warn!("Ignoring unreadable box cache {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn store(&self, image_name: &str, boxes: &[LabeledBox]) -> AppResult<()> {
        let Some(path) = self.entry_path(image_name) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            boxes: boxes.to_vec(),
        };
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        debug!("Cached {} boxes for {}", boxes.len(), image_name);
        Ok(())
    }
}
