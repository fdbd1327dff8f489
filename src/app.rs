use std::path::PathBuf;

use eframe::egui;
use log::{info, warn};

use crate::config::Settings;
use crate::error::AppError;
use crate::manifest::PhotoManifest;
use crate::render::Rgb;
use crate::screens::{draw::DrawScreen, gallery, verify::VerifyScreen};

// ── Notices ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
struct Notice {
    kind: NoticeKind,
    text: String,
    expires_at: f64,
}

const NOTICE_SECONDS: f64 = 5.0;

/// Short-lived messages shown along the bottom of the window.
#[derive(Debug, Default)]
pub struct Notices {
    pending: Vec<(NoticeKind, String)>,
    shown: Vec<Notice>,
}

impl Notices {
    pub fn push(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.pending.push((kind, text.into()));
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(NoticeKind::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.push(NoticeKind::Warning, text);
    }

    /// Reports `err` with a kind that matches how serious it is.
    pub fn report(&mut self, err: &AppError) {
        let kind = match err {
            AppError::InvalidUserAction(_) | AppError::UnresolvableResource(_) => NoticeKind::Warning,
            _ => NoticeKind::Error,
        };
        self.push(kind, err.to_string());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        for (kind, text) in self.pending.drain(..) {
            self.shown.push(Notice {
                kind,
                text,
                expires_at: now + NOTICE_SECONDS,
            });
        }
        self.shown.retain(|n| n.expires_at > now);
        if self.shown.is_empty() {
            return;
        }

        egui::TopBottomPanel::bottom("notices").show(ctx, |ui| {
            for notice in &self.shown {
                let color = match notice.kind {
                    NoticeKind::Info => ui.visuals().text_color(),
                    NoticeKind::Warning => ui.visuals().warn_fg_color,
                    NoticeKind::Error => ui.visuals().error_fg_color,
                };
                ui.colored_label(color, &notice.text);
            }
        });
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

// ── Navigation ──────────────────────────────────────────────────────────────

/// Where a screen asks to go next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nav {
    Home,
    Folders,
    Photos(String),
    Draw { folder: String, photo: String },
    Verify,
}

enum Screen {
    Home,
    Folders,
    Photos(String),
    Draw(Box<DrawScreen>),
    Verify(Box<VerifyScreen>),
}

/// State every screen may read.
pub struct Shared {
    pub settings: Settings,
    pub manifest: PhotoManifest,
    pub highlight: Rgb,
    pub notices: Notices,
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotatorApp {
    shared: Shared,
    screen: Screen,
}

impl AnnotatorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings, manifest: PhotoManifest) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let mut notices = Notices::default();
        let highlight = settings.highlight().unwrap_or_else(|e| {
            warn!("{}", e);
            Rgb::new(255, 255, 0)
        });
        if manifest.is_empty() {
            notices.warn(format!(
                "No photos listed in {}; run `tide-annotate index` first",
                settings.manifest.display()
            ));
        }

        Self {
            shared: Shared {
                settings,
                manifest,
                highlight,
                notices,
            },
            screen: Screen::Home,
        }
    }

    fn navigate(&mut self, nav: Nav, ctx: &egui::Context) {
        info!("Navigating to {:?}", nav);
        self.screen = match nav {
            Nav::Home => Screen::Home,
            Nav::Folders => Screen::Folders,
            Nav::Photos(folder) => Screen::Photos(folder),
            Nav::Draw { folder, photo } => {
                let path: PathBuf = self.shared.settings.photo_path(&folder, &photo);
                Screen::Draw(Box::new(DrawScreen::new(
                    folder,
                    photo,
                    path,
                    &self.shared.settings,
                    ctx,
                )))
            }
            Nav::Verify => Screen::Verify(Box::new(VerifyScreen::new(&self.shared.settings))),
        };
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // bottom panel has to be laid out before the screen's central panel
        self.shared.notices.show(ctx);

        let shared = &mut self.shared;
        let nav = match &mut self.screen {
            Screen::Home => gallery::home(ctx),
            Screen::Folders => gallery::folders(ctx, shared),
            Screen::Photos(folder) => gallery::photos(ctx, shared, folder),
            Screen::Draw(screen) => screen.update(ctx, shared),
            Screen::Verify(screen) => screen.update(ctx, shared),
        };
        if shared.notices.has_pending() {
            ctx.request_repaint();
        }

        if let Some(nav) = nav {
            self.navigate(nav, ctx);
        }
    }
}
