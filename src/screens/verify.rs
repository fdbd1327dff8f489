use std::fs;
use std::path::PathBuf;

use eframe::egui;
use log::{info, trace};

use crate::app::{Nav, NoticeKind, Shared};
use crate::canvas::{Canvas, LoadEvent};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::interaction::{CanvasMapping, SelectionChanged, SelectionState};
use crate::predictions::{parse_predictions, resolve_images, PixelPrediction};
use crate::render::{self, ClassPalette, LabelPlacement, Overlay, PlanOptions, Rgb};
use crate::screens::header;

/// Decodes running at once; the rest wait in `Entry::queued`.
const MAX_LOADS_IN_FLIGHT: usize = 4;

struct Entry {
    key: String,
    predictions: Vec<PixelPrediction>,
    canvas: Result<Canvas, String>,
    queued: Option<PathBuf>,
    selection: SelectionState,
}

/// Side-by-side review of imported predictions, one canvas per image.
pub struct VerifyScreen {
    canvas_size: [u32; 2],
    entries: Vec<Entry>,
    loaded: bool,
    palette: ClassPalette,
}

fn read_dropped(file: &egui::DroppedFile) -> AppResult<Vec<u8>> {
    if let Some(bytes) = &file.bytes {
        return Ok(bytes.to_vec());
    }
    match &file.path {
        Some(path) => Ok(fs::read(path)?),
        None => Err(AppError::MalformedImport(format!(
            "dropped file '{}' has no contents",
            file.name
        ))),
    }
}

impl VerifyScreen {
    pub fn new(settings: &Settings) -> Self {
        Self {
            canvas_size: settings.verify_canvas,
            entries: Vec::new(),
            loaded: false,
            palette: ClassPalette::new(),
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, shared: &mut Shared) -> Option<Nav> {
        let nav = header(ctx, "verify", "Verify Inferences", Nav::Home);

        // only the first file of a multi-file drop is used
        let dropped = ctx.input(|i| i.raw.dropped_files.first().cloned());
        if let Some(file) = dropped {
            match read_dropped(&file).and_then(|bytes| self.import(&bytes, ctx, shared)) {
                Ok(()) => {}
                Err(e) => shared.notices.report(&e),
            }
        }

        self.poll_loads(ctx, shared);

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.loaded {
                self.drop_zone(ui, ctx, shared);
                return;
            }
            ui.horizontal(|ui| {
                ui.label(format!("{} images", self.entries.len()));
                if ui.button("Load another file").clicked() {
                    self.entries.clear();
                    self.loaded = false;
                }
            });
            ui.separator();

            let highlight = shared.highlight;
            let palette = &mut self.palette;
            egui::ScrollArea::vertical().show(ui, |ui| {
                for entry in &mut self.entries {
                    entry_ui(ui, entry, palette, highlight);
                    ui.add_space(16.0);
                }
            });
        });
        nav
    }

    fn drop_zone(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, shared: &mut Shared) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.label("Drop a predictions JSON file anywhere in this window, or");
            if ui.button("Choose file…").clicked() {
                let picked = rfd::FileDialog::new()
                    .add_filter("Predictions", &["json"])
                    .pick_file();
                if let Some(path) = picked {
                    let result = fs::read(&path)
                        .map_err(AppError::from)
                        .and_then(|bytes| self.import(&bytes, ctx, shared));
                    if let Err(e) = result {
                        shared.notices.report(&e);
                    }
                }
            }
        });
    }

    /// Collects finished decodes, then starts queued ones up to
    /// [`MAX_LOADS_IN_FLIGHT`].
    fn poll_loads(&mut self, ctx: &egui::Context, shared: &mut Shared) {
        for entry in &mut self.entries {
            if let Ok(canvas) = &mut entry.canvas {
                if let Some(LoadEvent::Failed(msg)) = canvas.poll(ctx) {
                    shared
                        .notices
                        .push(NoticeKind::Error, format!("{}: {}", entry.key, msg));
                }
            }
        }
        self.start_queued(ctx);
    }

    fn loads_in_flight(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.canvas, Ok(c) if c.is_loading()))
            .count()
    }

    fn start_queued(&mut self, ctx: &egui::Context) {
        let mut in_flight = self.loads_in_flight();
        for entry in &mut self.entries {
            if in_flight >= MAX_LOADS_IN_FLIGHT {
                break;
            }
            let Ok(canvas) = &mut entry.canvas else {
                continue;
            };
            if let Some(path) = entry.queued.take() {
                canvas.load(path, ctx);
                in_flight += 1;
            }
        }
    }

    /// Replaces the current entries with the predictions in `bytes`.
    fn import(&mut self, bytes: &[u8], ctx: &egui::Context, shared: &mut Shared) -> AppResult<()> {
        let file = parse_predictions(bytes)?;
        let imported = resolve_images(file, &shared.manifest, &shared.settings.photo_root);

        let [w, h] = self.canvas_size;
        self.entries = imported
            .into_iter()
            .map(|img| {
                let predictions = img
                    .predictions
                    .iter()
                    .map(|p| p.to_pixels(w as f64, h as f64))
                    .collect();
                let (canvas, queued) = match img.image {
                    Ok(path) => (
                        Ok(Canvas::new(img.key.clone(), self.canvas_size).texture_only()),
                        Some(path),
                    ),
                    Err(reason) => (Err(reason), None),
                };
                if canvas.is_err() {
                    shared
                        .notices
                        .report(&AppError::UnresolvableResource(img.key.clone()));
                }
                Entry {
                    key: img.key,
                    predictions,
                    canvas,
                    queued,
                    selection: SelectionState::default(),
                }
            })
            .collect();
        self.loaded = true;
        info!("Verifying {} images", self.entries.len());
        self.start_queued(ctx);
        Ok(())
    }
}

fn overlays(predictions: &[PixelPrediction]) -> Vec<Overlay> {
    predictions
        .iter()
        .map(|p| Overlay {
            rect: p.rect,
            label: p.label.to_string(),
            outline: p.outline.clone(),
        })
        .collect()
}

fn entry_ui(ui: &mut egui::Ui, entry: &mut Entry, palette: &mut ClassPalette, highlight: Rgb) {
    ui.vertical_centered(|ui| {
        let canvas = match &entry.canvas {
            Ok(canvas) => canvas,
            Err(reason) => {
                ui.colored_label(ui.visuals().warn_fg_color, reason);
                ui.label(&entry.key);
                return;
            }
        };
        let Some(surface) = canvas.surface() else {
            if canvas.is_loading() || entry.queued.is_some() {
                ui.spinner();
            } else if let Some(err) = canvas.error() {
                ui.colored_label(ui.visuals().error_fg_color, err);
            }
            ui.label(&entry.key);
            return;
        };
        let size = surface.size();

        let width = (ui.available_width() as f64).min(size[0]);
        let display = egui::vec2(width as f32, (width * size[1] / size[0]) as f32);
        let (rect, response) = ui.allocate_exact_size(display, egui::Sense::click());
        let mapping = CanvasMapping::new(rect, size);

        let pointer = response.hover_pos().map(|p| mapping.to_canvas(p));
        let rects = entry.predictions.iter().map(|p| p.rect);
        if let Some(SelectionChanged(Some(index))) = entry.selection.hover.update(rects, pointer) {
            trace!("Hovering prediction {} on {}", index, entry.key);
        }
        let hovered = entry.selection.hover.hover_index();

        let painter = ui.painter_at(rect);
        painter.image(
            surface.texture.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        let opts = PlanOptions {
            canvas_width: size[0],
            canvas_height: size[1],
            highlighted: hovered,
            highlight_color: Some(highlight),
            placement: LabelPlacement::Corner,
        };
        let plan = render::plan(&overlays(&entry.predictions), &opts, palette);
        render::paint(&painter, &plan, &mapping);

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let hit = entry.selection.click(mapping.to_canvas(pos));
                if let Some(p) = hit.and_then(|i| entry.predictions.get(i)) {
                    info!("Selected '{}' at {:?} on {}", p.label, p.rect, entry.key);
                }
            }
        }

        match hovered.and_then(|i| entry.predictions.get(i)) {
            Some(p) => ui.label(format!("{} | {}", entry.key, p.label)),
            None => ui.label(&entry.key),
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{Point, Rect};
    use crate::manifest::PhotoManifest;
    use crate::predictions::Label;

    #[test]
    fn overlays_keep_labels_and_outlines() {
        let preds = vec![PixelPrediction {
            rect: Rect::new(1.0, 2.0, 3.0, 4.0),
            label: Label::Name("limpet".into()),
            outline: vec![Point::new(1.0, 2.0)],
        }];
        let o = overlays(&preds);
        assert_eq!(o[0].label, "limpet");
        assert_eq!(o[0].outline.len(), 1);
        assert_eq!(o[0].rect, preds[0].rect);
    }

    #[test]
    fn import_keeps_unresolved_entries() {
        let ctx = egui::Context::default();
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            photo_root: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let mut shared = Shared {
            settings,
            manifest: PhotoManifest::default(),
            highlight: Rgb::new(255, 255, 0),
            notices: Default::default(),
        };
        let mut screen = VerifyScreen::new(&shared.settings);
        let json = br#"{"siteA_1_img": [{"x": 0.5, "y": 0.5, "width": 0.1, "height": 0.1, "label": 1}]}"#;
        screen.import(json, &ctx, &mut shared).unwrap();

        assert!(screen.loaded);
        assert_eq!(screen.entries.len(), 1);
        assert!(screen.entries[0].canvas.is_err());
        assert_eq!(screen.entries[0].predictions[0].rect, Rect::new(450.0, 338.0, 100.0, 75.0));
        assert!(shared.notices.has_pending());
    }

    #[test]
    fn large_import_decodes_a_few_at_a_time() {
        use std::time::{Duration, Instant};

        let ctx = egui::Context::default();
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("siteA_run");
        fs::create_dir(&folder).unwrap();
        let mut files = Vec::new();
        let mut keys = Vec::new();
        for i in 0..64 {
            let name = format!("img{i}.png");
            image::RgbaImage::from_pixel(8, 6, image::Rgba([i as u8, 0, 0, 255]))
                .save(folder.join(&name))
                .unwrap();
            files.push(name);
            keys.push(format!(
                r#""siteA_run_img{i}": [{{"x": 0.5, "y": 0.5, "width": 0.5, "height": 0.5, "label": 1}}]"#
            ));
        }
        let mut shared = Shared {
            settings: Settings {
                photo_root: dir.path().to_path_buf(),
                verify_canvas: [4, 3],
                ..Settings::default()
            },
            manifest: PhotoManifest::from_folders([("siteA_run".to_string(), files)].into_iter().collect()),
            highlight: Rgb::new(255, 255, 0),
            notices: Default::default(),
        };
        let json = format!("{{{}}}", keys.join(","));
        let mut screen = VerifyScreen::new(&shared.settings);
        screen.import(json.as_bytes(), &ctx, &mut shared).unwrap();

        assert_eq!(screen.entries.len(), 64);
        assert_eq!(screen.loads_in_flight(), MAX_LOADS_IN_FLIGHT);
        let started = screen
            .entries
            .iter()
            .filter(|e| matches!(&e.canvas, Ok(c) if !c.is_empty()))
            .count();
        assert_eq!(started, MAX_LOADS_IN_FLIGHT);
        assert_eq!(screen.entries.iter().filter(|e| e.queued.is_some()).count(), 60);

        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            screen.poll_loads(&ctx, &mut shared);
            assert!(screen.loads_in_flight() <= MAX_LOADS_IN_FLIGHT);
            let ready = screen
                .entries
                .iter()
                .filter(|e| matches!(&e.canvas, Ok(c) if c.surface().is_some()))
                .count();
            if ready == 64 {
                break;
            }
            assert!(Instant::now() < deadline, "only {ready} of 64 loaded");
            std::thread::sleep(Duration::from_millis(5));
        }
        for entry in &screen.entries {
            let surface = entry.canvas.as_ref().ok().and_then(|c| c.surface()).unwrap();
            assert!(surface.image.is_none());
        }
    }

    #[test]
    fn malformed_import_leaves_screen_empty() {
        let ctx = egui::Context::default();
        let mut shared = Shared {
            settings: Settings::default(),
            manifest: PhotoManifest::default(),
            highlight: Rgb::new(255, 255, 0),
            notices: Default::default(),
        };
        let mut screen = VerifyScreen::new(&shared.settings);
        let err = screen.import(b"[]", &ctx, &mut shared).unwrap_err();
        assert!(matches!(err, AppError::MalformedImport(_)));
        assert!(!screen.loaded);
        assert!(screen.entries.is_empty());
    }
}
