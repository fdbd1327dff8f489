use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ── Geometry ────────────────────────────────────────────────────────────────

/// A point in canvas pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn floor(self) -> Self {
        Self {
            x: self.x.floor(),
            y: self.y.floor(),
        }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x + self.width, self.y),
            Point::new(self.x, self.y),
            Point::new(self.x, self.y + self.height),
            Point::new(self.x + self.width, self.y + self.height),
        ]
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ── Box Model ───────────────────────────────────────────────────────────────

/// A manually drawn box. Coordinates live in the pixel space of the image as
/// displayed on the draw canvas, and `class_label` is 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledBox {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub class_label: u32,
}

impl LabeledBox {
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.center_x - self.width / 2.0,
            self.center_y - self.height / 2.0,
            self.width,
            self.height,
        )
    }
}

/// Export form of a box. Only the center is divided by the image size; width
/// and height stay in pixels, which is what the exported files contain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub class_index: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    #[cfg(test)]
    pub fn denormalize(&self, image_width: f64, image_height: f64) -> LabeledBox {
        LabeledBox {
            center_x: self.x * image_width,
            center_y: self.y * image_height,
            width: self.width,
            height: self.height,
            class_label: self.class_index + 1,
        }
    }
}

/// Builds the box spanned by two clicks, in either order.
pub fn create_box(p1: Point, p2: Point, class_label: u32) -> LabeledBox {
    let width = (p2.x - p1.x).abs();
    let height = (p2.y - p1.y).abs();
    let left = p1.x.min(p2.x);
    let top = p1.y.min(p2.y);
    LabeledBox {
        center_x: left + width / 2.0,
        center_y: top + height / 2.0,
        width,
        height,
        class_label,
    }
}

pub fn to_normalized(
    b: &LabeledBox,
    image_width: f64,
    image_height: f64,
) -> AppResult<NormalizedBox> {
    if b.class_label == 0 {
        return Err(AppError::InvalidClassLabel(b.class_label));
    }
    if image_width <= 0.0 || image_height <= 0.0 {
        return Err(AppError::InvalidImageSize {
            width: image_width,
            height: image_height,
        });
    }
    Ok(NormalizedBox {
        class_index: b.class_label - 1,
        x: b.center_x / image_width,
        y: b.center_y / image_height,
        width: b.width,
        height: b.height,
    })
}

pub fn remove_last(boxes: &mut Vec<LabeledBox>) -> Option<LabeledBox> {
    boxes.pop()
}

/// Index of the box under `point`.
///
/// Boxes are scanned in list order. The first containing box becomes the
/// candidate; a later containing box only replaces it when its top-left
/// corner sits inside the current candidate, so a box nested in a larger one
/// wins while a merely overlapping neighbour does not.
pub fn hit_test<I>(rects: I, point: Point) -> Option<usize>
where
    I: IntoIterator<Item = Rect>,
{
    let mut best: Option<(usize, Rect)> = None;
    for (i, rect) in rects.into_iter().enumerate() {
        if !rect.contains(point) {
            continue;
        }
        let replace = match best {
            None => true,
            Some((_, current)) => current.contains(Point::new(rect.x, rect.y)),
        };
        if replace {
            best = Some((i, rect));
        }
    }
    best.map(|(i, _)| i)
}
