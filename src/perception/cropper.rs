//! Person-centric re-frame: cut the candidate down to the primary person
//! plus margin, dropping residual UI chrome around the photo.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::perception::overlay::{self, OverlayConfig, TextRegion};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropConfig {
    /// Scale applied to the primary person box, anchored at its center.
    /// 1.4 leaves a 20% margin per side.
    #[serde(default = "default_padding_factor")]
    pub padding_factor: f32,
}

fn default_padding_factor() -> f32 {
    1.4
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            padding_factor: default_padding_factor(),
        }
    }
}

/// Compute the person-centric rect for a candidate. The padded person box is
/// shifted into the frame bounds (never shrunk to distort aspect unless it
/// cannot fit) and re-checked against the overlay filter; if the re-framed
/// rect is still contaminated the original candidate wins — this is a
/// best-effort de-chrome step, not a hard requirement.
pub fn person_centric_rect(
    candidate: &Rect,
    primary_person: &Rect,
    frame_bounds: &Rect,
    texts: &[TextRegion],
    crop_cfg: &CropConfig,
    overlay_cfg: &OverlayConfig,
) -> Rect {
    if primary_person.is_degenerate() {
        return *candidate;
    }

    let padded = primary_person
        .scale_about_center(crop_cfg.padding_factor)
        .shift_into(frame_bounds);

    if padded.is_degenerate() {
        return *candidate;
    }

    if overlay::is_contaminated(&padded, texts, overlay_cfg) {
        tracing::debug!("re-framed rect still contaminated — keeping original region");
        return *candidate;
    }

    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    #[test]
    fn pads_around_person_center() {
        let cand = Rect::new(100.0, 100.0, 400.0, 400.0);
        let person = Rect::new(200.0, 200.0, 100.0, 200.0);
        let out = person_centric_rect(
            &cand,
            &person,
            &frame(),
            &[],
            &CropConfig::default(),
            &OverlayConfig::default(),
        );
        assert_eq!(out.center(), person.center());
        assert!((out.w - 140.0).abs() < 1e-3);
        assert!((out.h - 280.0).abs() < 1e-3);
    }

    #[test]
    fn shifts_inside_frame_without_shrinking() {
        let cand = Rect::new(0.0, 0.0, 400.0, 400.0);
        // Person flush against the top-left corner: padding would spill out.
        let person = Rect::new(0.0, 0.0, 100.0, 100.0);
        let out = person_centric_rect(
            &cand,
            &person,
            &frame(),
            &[],
            &CropConfig::default(),
            &OverlayConfig::default(),
        );
        assert!((out.w - 140.0).abs() < 1e-3);
        assert!((out.h - 140.0).abs() < 1e-3);
        assert!(out.x >= 0.0 && out.y >= 0.0);
    }

    #[test]
    fn residual_contamination_keeps_original() {
        let cand = Rect::new(100.0, 100.0, 400.0, 400.0);
        let person = Rect::new(200.0, 200.0, 100.0, 200.0);
        // Caption covering the padded rect's top band.
        let text = TextRegion {
            text: "2 miles away".into(),
            bbox: Rect::new(180.0, 160.0, 140.0, 40.0),
            confidence: 0.95,
        };
        let out = person_centric_rect(
            &cand,
            &person,
            &frame(),
            &[text],
            &CropConfig::default(),
            &OverlayConfig::default(),
        );
        assert_eq!(out, cand);
    }

    #[test]
    fn degenerate_person_box_keeps_original() {
        let cand = Rect::new(10.0, 10.0, 100.0, 100.0);
        let person = Rect::new(20.0, 20.0, 0.0, 0.0);
        let out = person_centric_rect(
            &cand,
            &person,
            &frame(),
            &[],
            &CropConfig::default(),
            &OverlayConfig::default(),
        );
        assert_eq!(out, cand);
    }
}
