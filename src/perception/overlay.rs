//! UI-overlay filter: decides whether a candidate photo region is
//! contaminated by on-screen text (status bars, buttons, captions).

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// One OCR result for a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub bbox: Rect,
    pub confidence: f32,
}

/// Contamination thresholds. Hand-tuned values carried as configuration,
/// not constants, pending empirical validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Overlap ratio above which any text region contaminates the candidate.
    #[serde(default = "default_strong_overlap")]
    pub strong_overlap: f32,
    /// Lower overlap ratio that still contaminates when the text sits in the
    /// candidate's edge bands, where UI chrome concentrates.
    #[serde(default = "default_edge_overlap")]
    pub edge_overlap: f32,
    /// Fraction of the candidate's height counted as the top and bottom band.
    #[serde(default = "default_edge_band")]
    pub edge_band: f32,
}

fn default_strong_overlap() -> f32 {
    0.30
}

fn default_edge_overlap() -> f32 {
    0.05
}

fn default_edge_band() -> f32 {
    0.20
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            strong_overlap: default_strong_overlap(),
            edge_overlap: default_edge_overlap(),
            edge_band: default_edge_band(),
        }
    }
}

/// True when any text region intrudes on the candidate enough to call it
/// UI chrome rather than photo content. Degenerate rects on either side
/// never contaminate.
pub fn is_contaminated(candidate: &Rect, texts: &[TextRegion], cfg: &OverlayConfig) -> bool {
    if candidate.is_degenerate() {
        return false;
    }

    for region in texts {
        let ratio = candidate.overlap_ratio(&region.bbox);
        if ratio <= 0.0 {
            continue;
        }
        if ratio > cfg.strong_overlap {
            tracing::trace!(text = %region.text, ratio, "strong overlay contamination");
            return true;
        }
        if ratio > cfg.edge_overlap && in_edge_band(candidate, &region.bbox, cfg.edge_band) {
            tracing::trace!(text = %region.text, ratio, "edge-band overlay contamination");
            return true;
        }
    }
    false
}

/// Text position relative to the candidate's own bounds: contamination bands
/// are the top and bottom `band` fraction of the candidate's height.
fn in_edge_band(candidate: &Rect, text: &Rect, band: f32) -> bool {
    let (_, text_cy) = text.center();
    let rel = (text_cy - candidate.y) / candidate.h;
    rel <= band || rel >= 1.0 - band
}
