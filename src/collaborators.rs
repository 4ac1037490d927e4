//! Collaborator contracts the pipeline consumes.
//!
//! Each trait is a seam for a concrete engine (screen capture, OCR, saliency,
//! person detection, input simulation). The pipeline only ever talks to these
//! traits, so tests swap in scripted implementations.

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::errors::ScrollCullResult;
use crate::perception::overlay::TextRegion;
use crate::perception::person::RawPersonBox;

/// Delivers a full-screen frame on demand.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> ScrollCullResult<DynamicImage>;
}

/// Returns text regions with bounding boxes and confidence for a frame.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &DynamicImage) -> ScrollCullResult<Vec<TextRegion>>;
}

/// A candidate photo area, in normalized [0,1] coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SalientRegion {
    /// `[xmin, ymin, xmax, ymax]`
    pub bbox: [f32; 4],
}

/// Proposes candidate photo regions for a frame.
#[async_trait]
pub trait SaliencyDetector: Send + Sync {
    async fn detect(&self, frame: &DynamicImage) -> ScrollCullResult<Vec<SalientRegion>>;
}

/// Finds person bounding boxes in an image.
#[async_trait]
pub trait PersonDetector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>>;
}

/// Issues a vertical scroll input.
#[async_trait]
pub trait Scroller: Send + Sync {
    async fn scroll(&self, amount: i32) -> ScrollCullResult<()>;
}

/// Fallback saliency when no external engine is wired in: the whole frame is
/// the single candidate.
pub struct FullFrameSaliency;

#[async_trait]
impl SaliencyDetector for FullFrameSaliency {
    async fn detect(&self, _frame: &DynamicImage) -> ScrollCullResult<Vec<SalientRegion>> {
        Ok(vec![SalientRegion {
            bbox: [0.0, 0.0, 1.0, 1.0],
        }])
    }
}

/// Stand-in when person detection is unavailable (e.g. missing model file):
/// every candidate classifies as person-less.
pub struct NullPersonDetector;

#[async_trait]
impl PersonDetector for NullPersonDetector {
    async fn detect(&self, _image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
        Ok(Vec::new())
    }
}

/// Fallback OCR when no external engine is wired in: no text regions, so the
/// overlay filter never flags contamination.
pub struct NullTextRecognizer;

#[async_trait]
impl TextRecognizer for NullTextRecognizer {
    async fn recognize(&self, _frame: &DynamicImage) -> ScrollCullResult<Vec<TextRegion>> {
        Ok(Vec::new())
    }
}
