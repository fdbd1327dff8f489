//! Turning a list of boxes into strokes.
//!
//! Rendering happens in two steps. [`plan`] decides, from the box list, the
//! canvas size and the highlighted index, what each box looks like and in
//! which order it is drawn. A backend then paints the plan: [`paint`] onto an
//! egui painter for the live canvas, [`rasterize`] onto a copy of the photo
//! for snapshots. Both always start from the bare image and draw every box.

use std::collections::HashMap;

use eframe::egui;
use image::RgbaImage;
use log::debug;

use crate::boxes::{Point, Rect};
use crate::error::{AppError, AppResult};
use crate::interaction::CanvasMapping;

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (the `#` is optional).
    pub fn from_hex(hex: &str) -> AppResult<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || AppError::Config(format!("invalid color '{hex}'"));
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn to_egui(self) -> egui::Color32 {
        egui::Color32::from_rgb(self.r, self.g, self.b)
    }

    fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match (i as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb::new((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// FNV-1a, so a label maps to the same color on every run.
fn label_hash(label: &str) -> u32 {
    label.bytes().fold(0x811c_9dc5_u32, |h, byte| {
        (h ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Class label -> color, owned by one screen for its whole lifetime.
#[derive(Debug, Default)]
pub struct ClassPalette {
    colors: HashMap<String, Rgb>,
}

impl ClassPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, label: &str) -> Rgb {
        *self.colors.entry(label.to_string()).or_insert_with(|| {
            // golden-ratio step spreads neighbouring hashes around the hue wheel
            let hue = (f64::from(label_hash(label)) * 0.618_033_988_75).fract() as f32;
            let color = hsv_to_rgb(hue, 0.75, 0.95);
            debug!("Class '{}' drawn in {}", label, color.to_hex());
            color
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.colors.len()
    }
}

// ── Plan ────────────────────────────────────────────────────────────────────

/// Stroke width tier for a canvas of the given pixel width.
pub fn line_width(canvas_width: f64) -> f64 {
    if canvas_width > 1000.0 {
        4.0
    } else if canvas_width > 600.0 {
        3.0
    } else {
        2.0
    }
}

/// Keeps a stroke of `line_width` inside a `canvas_width` x `canvas_height`
/// surface.
pub fn clamp_rect(rect: Rect, line_width: f64, canvas_width: f64, canvas_height: f64) -> Rect {
    let half = line_width / 2.0;
    let mut r = rect;
    r.x = r.x.max(half);
    r.y = r.y.max(half);
    if r.x + r.width > canvas_width {
        r.width = (canvas_width - line_width - r.x).max(0.0);
    }
    if r.y + r.height > canvas_height {
        r.height = (canvas_height - line_width - r.y).max(0.0);
    }
    r
}

/// Every index once, the highlighted one last.
pub fn render_order(len: usize, highlighted: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).filter(|i| Some(*i) != highlighted).collect();
    if let Some(h) = highlighted.filter(|h| *h < len) {
        order.push(h);
    }
    order
}

const CORNER_LABEL_COLOR: Rgb = Rgb::new(255, 0, 255);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelPlacement {
    /// Beside the top-right corner.
    Corner,
    Centered,
}

/// Something to outline on the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub rect: Rect,
    pub label: String,
    pub outline: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawnBox {
    pub index: usize,
    pub rect: Rect,
    pub color: Rgb,
    pub label_color: Rgb,
    pub line_width: f64,
    pub label: String,
    pub label_anchor: Point,
    pub outline: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderPlan {
    pub boxes: Vec<DrawnBox>,
    pub placement: LabelPlacement,
}

pub struct PlanOptions {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub highlighted: Option<usize>,
    pub highlight_color: Option<Rgb>,
    pub placement: LabelPlacement,
}

pub fn plan(overlays: &[Overlay], opts: &PlanOptions, palette: &mut ClassPalette) -> RenderPlan {
    let width = line_width(opts.canvas_width);
    let boxes = render_order(overlays.len(), opts.highlighted)
        .into_iter()
        .map(|index| {
            let overlay = &overlays[index];
            let rect = clamp_rect(overlay.rect, width, opts.canvas_width, opts.canvas_height);
            let class_color = palette.color_for(&overlay.label);
            let color = match opts.highlight_color {
                Some(c) if Some(index) == opts.highlighted => c,
                _ => class_color,
            };
            let (label_anchor, label_color) = match opts.placement {
                LabelPlacement::Corner => {
                    (Point::new(rect.x + rect.width, rect.y), CORNER_LABEL_COLOR)
                }
                LabelPlacement::Centered => (rect.center(), color),
            };
            DrawnBox {
                index,
                rect,
                color,
                label_color,
                line_width: width,
                label: overlay.label.clone(),
                label_anchor,
                outline: overlay.outline.clone(),
            }
        })
        .collect();
    RenderPlan {
        boxes,
        placement: opts.placement,
    }
}

// ── egui backend ────────────────────────────────────────────────────────────

pub fn paint(painter: &egui::Painter, plan: &RenderPlan, mapping: &CanvasMapping) {
    let scale = mapping.display_scale();
    let (font_size, align) = match plan.placement {
        LabelPlacement::Corner => (18.0, egui::Align2::LEFT_BOTTOM),
        LabelPlacement::Centered => (14.0, egui::Align2::CENTER_CENTER),
    };
    for drawn in &plan.boxes {
        let color = drawn.color.to_egui();
        let stroke = egui::Stroke::new(drawn.line_width as f32 * scale, color);
        let corners = drawn
            .rect
            .corners()
            .iter()
            .map(|p| mapping.to_screen(*p))
            .collect();
        painter.add(egui::Shape::closed_line(corners, stroke));

        if drawn.outline.len() > 2 {
            let outline = drawn.outline.iter().map(|p| mapping.to_screen(*p)).collect();
            painter.add(egui::Shape::closed_line(outline, stroke));
        }

        painter.text(
            mapping.to_screen(drawn.label_anchor),
            align,
            &drawn.label,
            egui::FontId::proportional(font_size * scale),
            drawn.label_color.to_egui(),
        );
    }
}

pub fn paint_pending(painter: &egui::Painter, point: Point, mapping: &CanvasMapping) {
    let center = mapping.to_screen(point);
    let stroke = egui::Stroke::new(1.5, egui::Color32::WHITE);
    painter.line_segment([center - egui::vec2(6.0, 0.0), center + egui::vec2(6.0, 0.0)], stroke);
    painter.line_segment([center - egui::vec2(0.0, 6.0), center + egui::vec2(0.0, 6.0)], stroke);
}

// ── Raster backend ──────────────────────────────────────────────────────────

/// Paints `plan` onto a copy of `base`. Labels are not rasterized.
pub fn rasterize(base: &RgbaImage, plan: &RenderPlan) -> RgbaImage {
    let mut img = base.clone();
    for drawn in &plan.boxes {
        let c = drawn.color.to_rgba();
        let t = drawn.line_width as f32;
        let corners = drawn.rect.corners();
        draw_closed_path(&mut img, &corners, t, c);
        if drawn.outline.len() > 2 {
            draw_closed_path(&mut img, &drawn.outline, t, c);
        }
    }
    img
}

fn draw_closed_path(img: &mut RgbaImage, points: &[Point], thickness: f32, color: [u8; 4]) {
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_line_on_image(
            img, a.x as f32, a.y as f32, b.x as f32, b.y as f32, thickness, color,
        );
    }
}

fn draw_line_on_image(
    img: &mut RgbaImage,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    thickness: f32,
    color: [u8; 4],
) {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let len = (dx * dx + dy * dy).sqrt();
    let steps = (len * 2.0) as i32;
    let half_t = (thickness / 2.0).max(0.5) as i32;
    let (w, h) = (img.width() as i32, img.height() as i32);

    for i in 0..=steps {
        let t = i as f32 / steps.max(1) as f32;
        let cx = (x0 + dx * t).round() as i32;
        let cy = (y0 + dy * t).round() as i32;
        for oy in -half_t..=half_t {
            for ox in -half_t..=half_t {
                let px = cx + ox;
                let py = cy + oy;
                if px >= 0 && px < w && py >= 0 && py < h {
                    img.put_pixel(px as u32, py as u32, image::Rgba(color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(x: f64, y: f64, w: f64, h: f64, label: &str) -> Overlay {
        Overlay {
            rect: Rect::new(x, y, w, h),
            label: label.to_string(),
            outline: Vec::new(),
        }
    }

    fn opts(highlighted: Option<usize>) -> PlanOptions {
        PlanOptions {
            canvas_width: 1000.0,
            canvas_height: 750.0,
            highlighted,
            highlight_color: None,
            placement: LabelPlacement::Corner,
        }
    }

    #[test]
    fn line_width_tiers() {
        assert_eq!(line_width(300.0), 2.0);
        assert_eq!(line_width(600.0), 2.0);
        assert_eq!(line_width(601.0), 3.0);
        assert_eq!(line_width(1000.0), 3.0);
        assert_eq!(line_width(1024.0), 4.0);
    }

    #[test]
    fn highlighted_box_is_drawn_last() {
        assert_eq!(render_order(4, Some(1)), vec![0, 2, 3, 1]);
        assert_eq!(render_order(3, None), vec![0, 1, 2]);
        assert_eq!(render_order(2, Some(7)), vec![0, 1]);
        assert!(render_order(0, Some(0)).is_empty());
    }

    #[test]
    fn clamp_keeps_stroke_on_canvas() {
        let r = clamp_rect(Rect::new(-5.0, 0.0, 200.0, 100.0), 4.0, 150.0, 80.0);
        assert_eq!(r.x, 2.0);
        assert_eq!(r.y, 2.0);
        assert_eq!(r.width, 144.0);
        assert_eq!(r.height, 74.0);
        assert!(r.x + r.width <= 150.0);
        assert!(r.y + r.height <= 80.0);

        let inside = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(clamp_rect(inside, 4.0, 150.0, 80.0), inside);
    }

    #[test]
    fn clamp_never_produces_negative_extent() {
        let r = clamp_rect(Rect::new(149.0, 79.0, 30.0, 30.0), 4.0, 150.0, 80.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.0);
    }

    #[test]
    fn palette_is_stable_across_plans() {
        let mut palette = ClassPalette::new();
        let overlays = vec![
            overlay(0.0, 0.0, 10.0, 10.0, "1"),
            overlay(20.0, 0.0, 10.0, 10.0, "2"),
            overlay(40.0, 0.0, 10.0, 10.0, "1"),
        ];
        let first = plan(&overlays, &opts(None), &mut palette);
        let second = plan(&overlays, &opts(Some(0)), &mut palette);
        assert_eq!(palette.len(), 2);
        assert_eq!(first.boxes[0].color, first.boxes[2].color);
        let color_of = |p: &RenderPlan, i: usize| p.boxes.iter().find(|b| b.index == i).unwrap().color;
        for i in 0..3 {
            assert_eq!(color_of(&first, i), color_of(&second, i));
        }
        assert_eq!(ClassPalette::new().color_for("2"), color_of(&first, 1));
    }

    #[test]
    fn plan_applies_highlight_and_label_anchor() {
        let overlays = vec![
            overlay(10.0, 20.0, 30.0, 40.0, "a"),
            overlay(100.0, 100.0, 50.0, 50.0, "b"),
        ];
        let highlight = Rgb::new(255, 255, 0);
        let mut palette = ClassPalette::new();
        let mut o = opts(Some(0));
        o.highlight_color = Some(highlight);
        let p = plan(&overlays, &o, &mut palette);
        assert_eq!(p.boxes.last().map(|b| b.index), Some(0));
        assert_eq!(p.boxes[1].color, highlight);
        assert_eq!(p.boxes[1].label_anchor, Point::new(40.0, 20.0));
        assert_eq!(p.boxes[0].line_width, 3.0);

        o.placement = LabelPlacement::Centered;
        let centered = plan(&overlays, &o, &mut palette);
        assert_eq!(centered.boxes[0].label_anchor, Point::new(125.0, 125.0));
        assert_eq!(centered.boxes[0].label_color, centered.boxes[0].color);
    }

    #[test]
    fn corner_labels_use_fixed_magenta() {
        let overlays = vec![
            overlay(10.0, 20.0, 30.0, 40.0, "a"),
            overlay(100.0, 100.0, 50.0, 50.0, "b"),
        ];
        let mut palette = ClassPalette::new();
        let p = plan(&overlays, &opts(None), &mut palette);
        for drawn in &p.boxes {
            assert_eq!(drawn.label_color, Rgb::new(255, 0, 255));
            assert_ne!(drawn.label_color, drawn.color);
        }
    }

    #[test]
    fn hex_colors() {
        assert_eq!(Rgb::from_hex("#ff00A0").unwrap(), Rgb::new(255, 0, 160));
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
        assert!(Rgb::from_hex("#fff").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn rasterize_strokes_border_and_leaves_base_untouched() {
        let base = RgbaImage::from_pixel(40, 30, image::Rgba([0, 0, 0, 255]));
        let mut palette = ClassPalette::new();
        let overlays = vec![overlay(10.0, 10.0, 20.0, 10.0, "1")];
        let o = PlanOptions {
            canvas_width: 40.0,
            canvas_height: 30.0,
            highlighted: None,
            highlight_color: None,
            placement: LabelPlacement::Centered,
        };
        let p = plan(&overlays, &o, &mut palette);
        let color = p.boxes[0].color;
        let out = rasterize(&base, &p);

        let expected = image::Rgba(color.to_rgba());
        assert_eq!(*out.get_pixel(20, 10), expected);
        assert_eq!(*out.get_pixel(10, 15), expected);
        assert_eq!(*out.get_pixel(30, 20), expected);
        // interior stays untouched
        assert_eq!(*out.get_pixel(20, 15), image::Rgba([0, 0, 0, 255]));
        assert_eq!(*base.get_pixel(20, 10), image::Rgba([0, 0, 0, 255]));
    }
}
