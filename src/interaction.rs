//! Pointer handling for the photo canvases.
//!
//! The verification canvases only track which box is under the pointer. The
//! draw canvas turns pairs of clicks into boxes. Both work in canvas pixel
//! space, which is rarely the on-screen size, so every pointer position goes
//! through a [`CanvasMapping`] first.

use eframe::egui;
use log::{debug, info};

use crate::boxes::{create_box, hit_test, remove_last, LabeledBox, Point, Rect};
use crate::error::{AppError, AppResult};

// ── Coordinates ─────────────────────────────────────────────────────────────

/// Where a canvas of `intrinsic` pixels is shown on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasMapping {
    pub displayed: egui::Rect,
    pub intrinsic: [f64; 2],
}

impl CanvasMapping {
    pub fn new(displayed: egui::Rect, intrinsic: [f64; 2]) -> Self {
        Self {
            displayed,
            intrinsic,
        }
    }

    /// Largest rect with the canvas aspect ratio that fits in `available`,
    /// centered horizontally and pinned to the top.
    pub fn fit(available: egui::Rect, intrinsic: [f64; 2]) -> Self {
        let [w, h] = intrinsic;
        let scale = (available.width() as f64 / w).min(available.height() as f64 / h);
        let size = egui::vec2((w * scale) as f32, (h * scale) as f32);
        let left = available.center().x - size.x / 2.0;
        let displayed = egui::Rect::from_min_size(egui::pos2(left, available.top()), size);
        Self::new(displayed, intrinsic)
    }

    /// Canvas pixels per screen point, per axis.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.intrinsic[0] / self.displayed.width() as f64,
            self.intrinsic[1] / self.displayed.height() as f64,
        )
    }

    /// Screen points per canvas pixel; used to size strokes and text.
    pub fn display_scale(&self) -> f32 {
        (self.displayed.width() as f64 / self.intrinsic[0]) as f32
    }

    pub fn to_canvas(&self, pos: egui::Pos2) -> Point {
        let (sx, sy) = self.scale();
        Point::new(
            (pos.x - self.displayed.left()) as f64 * sx,
            (pos.y - self.displayed.top()) as f64 * sy,
        )
    }

    pub fn to_screen(&self, p: Point) -> egui::Pos2 {
        let (sx, sy) = self.scale();
        egui::pos2(
            self.displayed.left() + (p.x / sx) as f32,
            self.displayed.top() + (p.y / sy) as f32,
        )
    }
}

// ── Hover tracking ──────────────────────────────────────────────────────────

/// Hovered box changed. `None` means no box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionChanged(pub Option<usize>);

#[derive(Debug, Default)]
pub struct HoverTracker {
    hover: Option<usize>,
    inside: bool,
}

impl HoverTracker {
    pub fn hover_index(&self) -> Option<usize> {
        self.hover
    }

    pub fn pointer_moved<I>(&mut self, rects: I, point: Point) -> SelectionChanged
    where
        I: IntoIterator<Item = Rect>,
    {
        self.inside = true;
        self.hover = hit_test(rects, point);
        SelectionChanged(self.hover)
    }

    /// Clears the hover. Reports once per leave, whatever was hovered.
    pub fn pointer_left(&mut self) -> Option<SelectionChanged> {
        self.hover = None;
        if std::mem::take(&mut self.inside) {
            Some(SelectionChanged(None))
        } else {
            None
        }
    }

    /// Feeds one frame's pointer position (`None` when outside the canvas).
    pub fn update<I>(&mut self, rects: I, pointer: Option<Point>) -> Option<SelectionChanged>
    where
        I: IntoIterator<Item = Rect>,
    {
        match pointer {
            Some(p) => Some(self.pointer_moved(rects, p)),
            None => self.pointer_left(),
        }
    }
}

/// Pointer state of one verification canvas. Screens own it, so leaving a
/// screen drops it.
#[derive(Debug, Default)]
pub struct SelectionState {
    pub hover: HoverTracker,
    pub last_click: Option<Point>,
}

impl SelectionState {
    /// Records a click and returns the box under it, if any.
    pub fn click(&mut self, point: Point) -> Option<usize> {
        self.last_click = Some(point);
        self.hover.hover_index()
    }
}

// ── Two-click drawing ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClickOutcome {
    /// First corner recorded.
    Pending(Point),
    Created(LabeledBox),
}

/// Box list for one photo plus the click in progress.
#[derive(Debug, Default)]
pub struct DrawController {
    class_label: Option<u32>,
    pending: Option<Point>,
    boxes: Vec<LabeledBox>,
}

impl DrawController {
    pub fn with_boxes(boxes: Vec<LabeledBox>) -> Self {
        Self {
            boxes,
            ..Self::default()
        }
    }

    pub fn boxes(&self) -> &[LabeledBox] {
        &self.boxes
    }

    pub fn pending(&self) -> Option<Point> {
        self.pending
    }

    pub fn class_label(&self) -> Option<u32> {
        self.class_label
    }

    /// 1-based label, or `None` to deselect.
    pub fn select_class(&mut self, class_label: Option<u32>) {
        self.class_label = class_label;
    }

    pub fn click(&mut self, point: Point) -> AppResult<ClickOutcome> {
        let Some(class_label) = self.class_label else {
            info!("Click ignored: no class selected");
            return Err(AppError::InvalidUserAction(
                "Please select a type first".into(),
            ));
        };
        let point = point.floor();
        match self.pending.take() {
            None => {
                debug!("First corner at ({}, {})", point.x, point.y);
                self.pending = Some(point);
                Ok(ClickOutcome::Pending(point))
            }
            Some(first) => {
                let b = create_box(first, point, class_label);
                debug!("Created box {:?}", b);
                self.boxes.push(b);
                Ok(ClickOutcome::Created(b))
            }
        }
    }

    pub fn undo(&mut self) -> Option<LabeledBox> {
        remove_last(&mut self.boxes)
    }
}
