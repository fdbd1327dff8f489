//! Photo canvas lifecycle: `Empty -> Loading -> Ready` (or `Failed`).
//!
//! Decoding happens on a background thread. The result comes back through a
//! channel that the UI polls once per frame; only then is the texture
//! uploaded and the canvas considered ready for drawing and pointer input.
//! Starting another load bumps the generation, so a slow earlier load that
//! finishes late is dropped.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui;
use image::imageops::FilterType;
use image::RgbaImage;
use log::{debug, error, info};

use crate::error::AppResult;

/// A decoded photo at canvas size, uploaded to the GPU. The CPU copy is
/// only kept for canvases that rasterize snapshots.
pub struct Surface {
    pub image: Option<RgbaImage>,
    pub texture: egui::TextureHandle,
    size: [f64; 2],
}

impl Surface {
    pub fn size(&self) -> [f64; 2] {
        self.size
    }
}

enum CanvasState {
    Empty,
    Loading,
    Ready(Surface),
    Failed(String),
}

/// Outcome reported by [`Canvas::poll`] when a load settles.
#[derive(Debug, PartialEq)]
pub enum LoadEvent {
    Ready,
    Failed(String),
}

type LoadResult = (u64, AppResult<RgbaImage>);

pub struct Canvas {
    name: String,
    size: [u32; 2],
    state: CanvasState,
    generation: u64,
    rx: Option<Receiver<LoadResult>>,
    keep_pixels: bool,
}

/// Reads `path` and stretches it to exactly `size`.
pub fn decode(path: &Path, size: [u32; 2]) -> AppResult<RgbaImage> {
    let img = image::open(path)?;
    Ok(img
        .resize_exact(size[0], size[1], FilterType::Triangle)
        .to_rgba8())
}

impl Canvas {
    pub fn new(name: impl Into<String>, size: [u32; 2]) -> Self {
        Self {
            name: name.into(),
            size,
            state: CanvasState::Empty,
            generation: 0,
            rx: None,
            keep_pixels: true,
        }
    }

    /// Drops the decoded pixels once the texture is uploaded.
    pub fn texture_only(mut self) -> Self {
        self.keep_pixels = false;
        self
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn load(&mut self, path: PathBuf, ctx: &egui::Context) {
        let size = self.size;
        info!("Loading {}", path.display());
        self.load_with(ctx, move || decode(&path, size));
    }

    /// Starts a load whose pixels come from `job`, run off the UI thread.
    pub fn load_with<F>(&mut self, ctx: &egui::Context, job: F)
    where
        F: FnOnce() -> AppResult<RgbaImage> + Send + 'static,
    {
        self.generation += 1;
        self.state = CanvasState::Loading;

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        let generation = self.generation;
        let ctx = ctx.clone();
        thread::spawn(move || {
            // receiver is gone when a newer load replaced this one
            if tx.send((generation, job())).is_ok() {
                ctx.request_repaint();
            }
        });
    }

    /// Picks up a finished load, if any. Call once per frame.
    pub fn poll(&mut self, ctx: &egui::Context) -> Option<LoadEvent> {
        let rx = self.rx.as_ref()?;
        let (generation, result) = match rx.try_recv() {
            Ok(msg) => msg,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                let msg = "image loader stopped unexpectedly".to_string();
                self.state = CanvasState::Failed(msg.clone());
                return Some(LoadEvent::Failed(msg));
            }
        };
        if generation != self.generation {
            debug!("Dropping stale load {} for {}", generation, self.name);
            return None;
        }
        self.rx = None;

        match result {
            Ok(image) => {
                let dims = [image.width() as usize, image.height() as usize];
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(dims, image.as_flat_samples().as_slice());
                let texture = ctx.load_texture(&self.name, color_image, egui::TextureOptions::LINEAR);
                let size = [image.width() as f64, image.height() as f64];
                let image = self.keep_pixels.then_some(image);
                self.state = CanvasState::Ready(Surface {
                    image,
                    texture,
                    size,
                });
                Some(LoadEvent::Ready)
            }
            Err(e) => {
                error!("Failed to load {}: {}", self.name, e);
                let msg = e.to_string();
                self.state = CanvasState::Failed(msg.clone());
                Some(LoadEvent::Failed(msg))
            }
        }
    }

    /// The ready surface; `None` while empty, loading or failed.
    pub fn surface(&self) -> Option<&Surface> {
        match &self.state {
            CanvasState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, CanvasState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CanvasState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        matches!(self.state, CanvasState::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for_event(canvas: &mut Canvas, ctx: &egui::Context) -> LoadEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = canvas.poll(ctx) {
                return event;
            }
            assert!(Instant::now() < deadline, "load never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([v, v, v, 255]))
    }

    #[test]
    fn no_surface_before_load_completes() {
        let ctx = egui::Context::default();
        let mut canvas = Canvas::new("photo", [4, 3]);
        assert!(canvas.is_empty());
        assert!(canvas.surface().is_none());

        let (release_tx, release_rx) = mpsc::channel::<()>();
        canvas.load_with(&ctx, move || {
            let _ = release_rx.recv();
            Ok(solid(4, 3, 9))
        });
        assert!(canvas.is_loading());
        assert!(canvas.surface().is_none());
        assert_eq!(canvas.poll(&ctx), None);

        release_tx.send(()).unwrap();
        assert_eq!(wait_for_event(&mut canvas, &ctx), LoadEvent::Ready);
        let surface = canvas.surface().unwrap();
        assert_eq!(surface.size(), [4.0, 3.0]);
        assert_eq!(surface.image.as_ref().unwrap().get_pixel(0, 0).0, [9, 9, 9, 255]);
    }

    #[test]
    fn superseded_load_is_ignored() {
        let ctx = egui::Context::default();
        let mut canvas = Canvas::new("photo", [2, 2]);

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        canvas.load_with(&ctx, move || {
            let _ = release_rx.recv();
            let _ = done_tx.send(());
            Ok(solid(2, 2, 1))
        });
        canvas.load_with(&ctx, || Ok(solid(2, 2, 200)));

        assert_eq!(wait_for_event(&mut canvas, &ctx), LoadEvent::Ready);
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        thread::sleep(Duration::from_millis(20));

        assert_eq!(canvas.poll(&ctx), None);
        let surface = canvas.surface().unwrap();
        assert_eq!(surface.image.as_ref().unwrap().get_pixel(1, 1).0, [200, 200, 200, 255]);
    }

    #[test]
    fn texture_only_canvas_drops_pixels() {
        let ctx = egui::Context::default();
        let mut canvas = Canvas::new("photo", [4, 3]).texture_only();
        canvas.load_with(&ctx, || Ok(solid(4, 3, 5)));
        assert_eq!(wait_for_event(&mut canvas, &ctx), LoadEvent::Ready);
        let surface = canvas.surface().unwrap();
        assert!(surface.image.is_none());
        assert_eq!(surface.size(), [4.0, 3.0]);
    }

    #[test]
    fn decode_failure_marks_canvas_failed() {
        let ctx = egui::Context::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jpg");
        let mut canvas = Canvas::new("missing", [8, 6]);
        canvas.load(path, &ctx);
        assert!(matches!(wait_for_event(&mut canvas, &ctx), LoadEvent::Failed(_)));
        assert!(canvas.error().is_some());
        assert!(canvas.surface().is_none());
    }

    #[test]
    fn decode_resizes_to_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        solid(40, 30, 77).save(&path).unwrap();
        let img = decode(&path, [8, 6]).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(3, 3).0, [77, 77, 77, 255]);
    }
}
