//! One module per screen. Each screen draws itself for a frame and may
//! return a [`Nav`] asking the app to switch screens.

pub mod draw;
pub mod gallery;
pub mod verify;

use eframe::egui;

use crate::app::Nav;

/// Top bar with a back button and the screen title.
pub fn header(ctx: &egui::Context, id: &str, title: &str, back: Nav) -> Option<Nav> {
    let mut nav = None;
    egui::TopBottomPanel::top(egui::Id::new(("header", id))).show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button("⬅ Back").clicked() {
                nav = Some(back);
            }
            ui.separator();
            ui.heading(title);
        });
    });
    nav
}
