//! The photo manifest: folder name -> ordered image file names.
//!
//! The manifest is produced once by `tide-annotate index` and loaded at
//! startup. After that it is shared read-only by every screen.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoManifest {
    folders: BTreeMap<String, Vec<String>>,
}

/// Where an image named by a prediction key lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedImage {
    pub folder: String,
    pub file: String,
}

impl ResolvedImage {
    pub fn path(&self, photo_root: &Path) -> PathBuf {
        photo_root.join(&self.folder).join(&self.file)
    }
}

/// Text before the first underscore.
fn site_prefix(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

/// Text before the first dot.
pub fn file_stem(file: &str) -> &str {
    file.split('.').next().unwrap_or(file)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

impl PhotoManifest {
    pub fn from_folders(folders: BTreeMap<String, Vec<String>>) -> Self {
        Self { folders }
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let data = fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&data)?;
        info!(
            "Loaded manifest {} ({} folders, {} photos)",
            path.display(),
            manifest.folders.len(),
            manifest.photo_count()
        );
        Ok(manifest)
    }

    pub fn write_json(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Builds a manifest from `root/<folder>/<image>`.
    ///
    /// Only directories directly under `root` become folders; anything named
    /// in `ignore` is skipped. Files are kept when their extension is one of
    /// [`IMAGE_EXTENSIONS`] (any case) and are sorted naturally.
    pub fn scan(root: &Path, ignore: &[String]) -> AppResult<Self> {
        let mut folders = BTreeMap::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if ignore.iter().any(|i| *i == name) {
                debug!("Ignoring folder {}", name);
                continue;
            }
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let mut files: Vec<String> = Vec::new();
            for file in fs::read_dir(entry.path())? {
                let file = file?;
                if file.file_type()?.is_file() && is_image(&file.path()) {
                    files.push(file.file_name().to_string_lossy().into_owned());
                }
            }
            alphanumeric_sort::sort_str_slice(&mut files);
            folders.insert(name, files);
        }

        let manifest = Self { folders };
        info!(
            "Parsed {} images over {} folders",
            manifest.photo_count(),
            manifest.folders.len()
        );
        Ok(manifest)
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    pub fn photos(&self, folder: &str) -> &[String] {
        self.folders.get(folder).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn photo_count(&self) -> usize {
        self.folders.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Folder whose site prefix matches the key's, first in folder-name order.
    pub fn resolve_folder(&self, key: &str) -> Option<&str> {
        let wanted = site_prefix(key);
        self.folders
            .keys()
            .find(|folder| site_prefix(folder) == wanted)
            .map(String::as_str)
    }

    /// Locates the image a prediction key refers to.
    ///
    /// The folder is picked by site prefix, then the file whose stem equals
    /// the key, or equals the key with `<folder>_` removed.
    pub fn resolve(&self, key: &str) -> AppResult<ResolvedImage> {
        let Some(folder) = self.resolve_folder(key) else {
            warn!("No folder matches prediction key {}", key);
            return Err(AppError::UnresolvableResource(key.to_string()));
        };

        let short = key
            .strip_prefix(folder)
            .and_then(|rest| rest.strip_prefix('_'));
        let file = self.photos(folder).iter().find(|file| {
            let stem = file_stem(file);
            stem == key || Some(stem) == short
        });

        match file {
            Some(file) => Ok(ResolvedImage {
                folder: folder.to_string(),
                file: file.clone(),
            }),
            None => {
                warn!("Folder {} has no image for key {}", folder, key);
                Err(AppError::UnresolvableResource(key.to_string()))
            }
        }
    }
}
