use eframe::egui;

use crate::app::{Nav, Shared};
use crate::manifest::file_stem;
use crate::screens::header;

const THUMBNAIL_WIDTH: f32 = 250.0;

pub fn home(ctx: &egui::Context) -> Option<Nav> {
    let mut nav = None;
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.25);
            ui.heading("Verify Inferences and Bounding Boxes");
            ui.label("Intertidal survey photo annotation");
            ui.add_space(24.0);
            if ui.button("Verify Inferences").clicked() {
                nav = Some(Nav::Verify);
            }
            ui.add_space(8.0);
            if ui.button("Draw Bounding Boxes").clicked() {
                nav = Some(Nav::Folders);
            }
        });
    });
    nav
}

pub fn folders(ctx: &egui::Context, shared: &mut Shared) -> Option<Nav> {
    let mut nav = header(ctx, "folders", "Bounding Boxes", Nav::Home);
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            for folder in shared.manifest.folders() {
                let count = shared.manifest.photos(folder).len();
                let text = format!("{folder}  ({count} photos)");
                if ui.link(egui::RichText::new(text).heading()).clicked() {
                    nav = Some(Nav::Photos(folder.to_string()));
                }
            }
        });
    });
    nav
}

pub fn photos(ctx: &egui::Context, shared: &mut Shared, folder: &str) -> Option<Nav> {
    let mut nav = header(ctx, "photos", "Draw Boxes", Nav::Folders);
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.label("The goal is to encase each individual species in its own bounding box.");
        ui.separator();

        let photos = shared.manifest.photos(folder);
        if photos.is_empty() {
            ui.label(format!("No photos listed for {folder}."));
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for photo in photos {
                    let path = shared.settings.photo_path(folder, photo);
                    ui.vertical(|ui| {
                        ui.set_width(THUMBNAIL_WIDTH);
                        let thumb = egui::Image::new(format!("file://{}", path.display()))
                            .max_width(THUMBNAIL_WIDTH)
                            .sense(egui::Sense::click());
                        let response = ui.add(thumb).on_hover_text(file_stem(photo));
                        if response.clicked() {
                            nav = Some(Nav::Draw {
                                folder: folder.to_string(),
                                photo: photo.clone(),
                            });
                        }
                        ui.small(photo);
                    });
                }
            });
        });
    });
    nav
}
