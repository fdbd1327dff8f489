use std::path::PathBuf;

use eframe::egui;
use log::info;

use crate::app::{Nav, NoticeKind, Shared};
use crate::boxes::{LabeledBox, Point};
use crate::canvas::{Canvas, LoadEvent};
use crate::config::Settings;
use crate::error::AppResult;
use crate::export::{export_file_name, export_lines, save_export, BoxCache};
use crate::interaction::{CanvasMapping, ClickOutcome, DrawController};
use crate::manifest::file_stem;
use crate::render::{self, ClassPalette, LabelPlacement, Overlay, PlanOptions, RenderPlan};
use crate::screens::header;

/// Manual box drawing on one photo.
pub struct DrawScreen {
    folder: String,
    photo: String,
    canvas: Canvas,
    controller: DrawController,
    palette: ClassPalette,
    cache: BoxCache,
    class_labels: Vec<String>,
}

fn class_name(labels: &[String], class_label: u32) -> String {
    (class_label as usize)
        .checked_sub(1)
        .and_then(|i| labels.get(i))
        .cloned()
        .unwrap_or_else(|| class_label.to_string())
}

fn overlays(boxes: &[LabeledBox], labels: &[String]) -> Vec<Overlay> {
    boxes
        .iter()
        .map(|b| Overlay {
            rect: b.rect(),
            label: class_name(labels, b.class_label),
            outline: Vec::new(),
        })
        .collect()
}

impl DrawScreen {
    pub fn new(
        folder: String,
        photo: String,
        path: PathBuf,
        settings: &Settings,
        ctx: &egui::Context,
    ) -> Self {
        let mut canvas = Canvas::new(photo.clone(), settings.draw_canvas);
        canvas.load(path, ctx);
        let cache = settings.box_cache();
        let controller = DrawController::with_boxes(cache.load(&photo));
        Self {
            folder,
            photo,
            canvas,
            controller,
            palette: ClassPalette::new(),
            cache,
            class_labels: settings.class_labels.clone(),
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, shared: &mut Shared) -> Option<Nav> {
        if let Some(LoadEvent::Failed(msg)) = self.canvas.poll(ctx) {
            shared.notices.push(NoticeKind::Error, msg);
        }
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z)) {
            self.undo(shared);
        }

        let title = format!("Bounding Boxes for {}", file_stem(&self.photo));
        let nav = header(ctx, "draw", &title, Nav::Photos(self.folder.clone()));

        egui::SidePanel::left("draw_tools")
            .resizable(false)
            .show(ctx, |ui| self.tools_ui(ui, shared));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ui, shared));
        nav
    }

    fn tools_ui(&mut self, ui: &mut egui::Ui, shared: &mut Shared) {
        ui.heading("Select Type to Draw");
        let current = self.controller.class_label();
        let mut selected = current;
        let selected_text = match current {
            Some(label) => class_name(&self.class_labels, label),
            None => "Select Type".to_string(),
        };
        egui::ComboBox::from_id_salt("class_picker")
            .selected_text(selected_text)
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut selected, None, "Select Type");
                for (i, name) in self.class_labels.iter().enumerate() {
                    ui.selectable_value(&mut selected, Some(i as u32 + 1), name);
                }
            });
        if selected != current {
            self.controller.select_class(selected);
        }

        ui.add_space(8.0);
        let undo_text = format!("Undo Last Box ({})", self.controller.boxes().len());
        if ui.button(undo_text).clicked() {
            self.undo(shared);
        }

        if let Some(p) = self.controller.pending() {
            ui.add_space(8.0);
            ui.label(format!("First corner at ({}, {}).", p.x, p.y));
            ui.label("Click the opposite corner.");
        }

        ui.separator();
        if ui.button("Save").clicked() {
            match self.export_labels(&shared.settings) {
                Ok(Some(path)) => shared
                    .notices
                    .info(format!("Saved {}", path.display())),
                Ok(None) => {}
                Err(e) => shared.notices.report(&e),
            }
        }
        if ui.button("Save snapshot").clicked() {
            match self.save_snapshot(&shared.settings) {
                Ok(Some(path)) => shared
                    .notices
                    .info(format!("Snapshot written to {}", path.display())),
                Ok(None) => {}
                Err(e) => shared.notices.report(&e),
            }
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui, shared: &mut Shared) {
        let Some(surface) = self.canvas.surface() else {
            if self.canvas.is_loading() {
                ui.spinner();
            } else if let Some(err) = self.canvas.error() {
                ui.colored_label(ui.visuals().error_fg_color, err);
            }
            return;
        };
        let size = surface.size();
        let texture_id = surface.texture.id();

        let mapping = CanvasMapping::fit(ui.available_rect_before_wrap(), size);
        let response = ui.allocate_rect(mapping.displayed, egui::Sense::click());
        let painter = ui.painter_at(mapping.displayed);
        painter.image(
            texture_id,
            mapping.displayed,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        let plan = self.plan(size);
        render::paint(&painter, &plan, &mapping);
        if let Some(p) = self.controller.pending() {
            render::paint_pending(&painter, p, &mapping);
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.click(mapping.to_canvas(pos), shared);
            }
        }
    }

    fn plan(&mut self, size: [f64; 2]) -> RenderPlan {
        let opts = PlanOptions {
            canvas_width: size[0],
            canvas_height: size[1],
            highlighted: None,
            highlight_color: None,
            placement: LabelPlacement::Centered,
        };
        render::plan(
            &overlays(self.controller.boxes(), &self.class_labels),
            &opts,
            &mut self.palette,
        )
    }

    fn click(&mut self, point: Point, shared: &mut Shared) {
        match self.controller.click(point) {
            Ok(ClickOutcome::Created(_)) => self.persist(shared),
            Ok(ClickOutcome::Pending(_)) => {}
            Err(e) => shared.notices.report(&e),
        }
    }

    fn undo(&mut self, shared: &mut Shared) {
        if self.controller.undo().is_some() {
            self.persist(shared);
        }
    }

    fn persist(&self, shared: &mut Shared) {
        if let Err(e) = self.cache.store(&self.photo, self.controller.boxes()) {
            shared.notices.report(&e);
        }
    }

    fn export_labels(&self, settings: &Settings) -> AppResult<Option<PathBuf>> {
        let [w, h] = self.canvas.size();
        let text = export_lines(self.controller.boxes(), w as f64, h as f64)?;
        let mut dialog = rfd::FileDialog::new()
            .set_file_name(export_file_name(&self.photo))
            .add_filter("Labels", &["txt"]);
        if let Some(dir) = &settings.export_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return Ok(None);
        };
        save_export(&path, &text)?;
        Ok(Some(path))
    }

    fn save_snapshot(&mut self, settings: &Settings) -> AppResult<Option<PathBuf>> {
        let Some(size) = self.canvas.surface().map(|s| s.size()) else {
            return Ok(None);
        };
        let plan = self.plan(size);
        let Some(base) = self.canvas.surface().and_then(|s| s.image.as_ref()) else {
            return Ok(None);
        };
        let img = render::rasterize(base, &plan);

        let mut dialog = rfd::FileDialog::new()
            .set_file_name(format!("{}_annotated.png", file_stem(&self.photo)))
            .add_filter("PNG", &["png"]);
        if let Some(dir) = &settings.export_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return Ok(None);
        };
        img.save(&path)?;
        info!("Exported snapshot to {}", path.display());
        Ok(Some(path))
    }
}
