//! Rectangle math shared by every extraction stage.
//!
//! All rects live in pixel space (f32) with the origin at the top-left.
//! Saliency output arrives in normalized [0,1] coordinates and is converted
//! here before anything else touches it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            w: (x2 - x1).max(0.0),
            h: (y2 - y1).max(0.0),
        }
    }

    /// Convert a normalized `[xmin, ymin, xmax, ymax]` box into pixel space.
    pub fn from_normalized(bbox: [f32; 4], frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w as f32;
        let fh = frame_h as f32;
        Self::from_corners(
            bbox[0].clamp(0.0, 1.0) * fw,
            bbox[1].clamp(0.0, 1.0) * fh,
            bbox[2].clamp(0.0, 1.0) * fw,
            bbox[3].clamp(0.0, 1.0) * fh,
        )
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }

    /// Fraction of `self` covered by `other` (intersection-over-region).
    /// Degenerate rects on either side yield 0.0.
    pub fn overlap_ratio(&self, other: &Rect) -> f32 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }
        match self.intersection(other) {
            Some(inter) => inter.area() / self.area(),
            None => 0.0,
        }
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = match self.intersection(other) {
            Some(r) => r.area(),
            None => 0.0,
        };
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Grow (or shrink) the rect by `factor` anchored at its center.
    pub fn scale_about_center(&self, factor: f32) -> Self {
        let (cx, cy) = self.center();
        let nw = self.w * factor;
        let nh = self.h * factor;
        Self::new(cx - nw / 2.0, cy - nh / 2.0, nw, nh)
    }

    /// Move the rect so it lies inside `bounds`, shifting before clamping so
    /// the aspect ratio survives whenever the rect fits at all. A rect larger
    /// than the bounds is clamped to them as a last resort.
    pub fn shift_into(&self, bounds: &Rect) -> Self {
        let mut r = *self;
        if r.right() > bounds.right() {
            r.x = bounds.right() - r.w;
        }
        if r.bottom() > bounds.bottom() {
            r.y = bounds.bottom() - r.h;
        }
        if r.x < bounds.x {
            r.x = bounds.x;
        }
        if r.y < bounds.y {
            r.y = bounds.y;
        }
        // Oversized rects still need trimming after the shift.
        let x2 = r.right().min(bounds.right());
        let y2 = r.bottom().min(bounds.bottom());
        Rect::from_corners(r.x, r.y, x2, y2)
    }

    /// Integer crop window `(x, y, w, h)` clamped to a `frame_w` × `frame_h`
    /// image, for handing to `image::DynamicImage::crop_imm`.
    pub fn to_crop_window(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let x = self.x.max(0.0).round() as u32;
        let y = self.y.max(0.0).round() as u32;
        let x = x.min(frame_w.saturating_sub(1));
        let y = y.min(frame_h.saturating_sub(1));
        let w = (self.w.round() as u32).min(frame_w - x).max(1);
        let h = (self.h.round() as u32).min(frame_h - y).max(1);
        (x, y, w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_basic() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, Rect::new(5.0, 5.0, 5.0, 5.0));
        assert!(a.intersection(&Rect::new(20.0, 20.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn overlap_ratio_is_over_self() {
        let cand = Rect::new(0.0, 0.0, 10.0, 10.0);
        let text = Rect::new(0.0, 0.0, 10.0, 5.0);
        assert!((cand.overlap_ratio(&text) - 0.5).abs() < 1e-6);
        assert!((text.overlap_ratio(&cand) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_rects_never_overlap() {
        let cand = Rect::new(0.0, 0.0, 0.0, 10.0);
        let text = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(cand.overlap_ratio(&text), 0.0);
        assert_eq!(text.overlap_ratio(&cand), 0.0);
    }

    #[test]
    fn scale_about_center_keeps_center() {
        let r = Rect::new(10.0, 10.0, 20.0, 10.0);
        let s = r.scale_about_center(1.4);
        assert_eq!(r.center(), s.center());
        assert!((s.w - 28.0).abs() < 1e-4);
        assert!((s.h - 14.0).abs() < 1e-4);
    }

    #[test]
    fn shift_into_prefers_translation() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r = Rect::new(90.0, -5.0, 20.0, 20.0);
        let shifted = r.shift_into(&bounds);
        // Same size, fully inside.
        assert_eq!(shifted.w, 20.0);
        assert_eq!(shifted.h, 20.0);
        assert!(shifted.x >= 0.0 && shifted.right() <= 100.0);
        assert!(shifted.y >= 0.0 && shifted.bottom() <= 100.0);
    }

    #[test]
    fn shift_into_trims_oversized() {
        let bounds = Rect::new(0.0, 0.0, 50.0, 50.0);
        let r = Rect::new(-10.0, -10.0, 200.0, 200.0);
        let out = r.shift_into(&bounds);
        assert_eq!(out, bounds);
    }

    #[test]
    fn normalized_conversion() {
        let r = Rect::from_normalized([0.25, 0.5, 0.75, 1.0], 400, 200);
        assert_eq!(r, Rect::new(100.0, 100.0, 200.0, 100.0));
    }
}
