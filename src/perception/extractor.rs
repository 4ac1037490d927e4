//! Per-frame extraction pipeline: saliency → overlay filter → person
//! classification → person-centric re-frame → completeness scoring.
//!
//! Every stage produces a new record rather than mutating in place; a
//! collaborator failure narrows the frame's output instead of aborting.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::collaborators::{PersonDetector, SaliencyDetector, TextRecognizer};
use crate::errors::ScrollCullResult;
use crate::geometry::Rect;
use crate::perception::completeness::completeness_score;
use crate::perception::cropper::{person_centric_rect, CropConfig};
use crate::perception::overlay::{self, OverlayConfig, TextRegion};
use crate::perception::person::{self, DetectionOutcome, PersonDetection};

/// Classification subfolder a photo lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subfolder {
    Person,
    MultiPerson,
    Other,
}

impl Subfolder {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subfolder::Person => "person",
            Subfolder::MultiPerson => "multi_person",
            Subfolder::Other => "other",
        }
    }
}

/// A candidate region that survived the overlay filter.
struct CandidatePhoto {
    image: DynamicImage,
    bbox: Rect,
}

/// Final pipeline output for one candidate, ready for persistence.
pub struct ScoredPhoto {
    pub image: DynamicImage,
    pub bbox: Rect,
    pub person_detection: Option<PersonDetection>,
    pub is_single_person: bool,
    /// Primary person box in frame coordinates.
    pub primary_person_box: Option<Rect>,
    pub completeness: f32,
    pub subfolder: Subfolder,
}

/// Everything extracted from one "after" frame.
pub struct FrameExtraction {
    pub photos: Vec<ScoredPhoto>,
    /// Concatenated OCR text for the frame.
    pub text: String,
}

pub struct ExtractionPipeline {
    pub ocr: std::sync::Arc<dyn TextRecognizer>,
    pub saliency: std::sync::Arc<dyn SaliencyDetector>,
    pub detector: std::sync::Arc<dyn PersonDetector>,
    pub overlay: OverlayConfig,
    pub crop: CropConfig,
}

impl ExtractionPipeline {
    pub async fn extract(&self, frame: &DynamicImage) -> ScrollCullResult<FrameExtraction> {
        let (frame_w, frame_h) = (frame.width(), frame.height());
        let frame_bounds = Rect::new(0.0, 0.0, frame_w as f32, frame_h as f32);

        // OCR and saliency collaborator errors degrade to empty results.
        let texts = match self.ocr.recognize(frame).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "OCR failed — continuing without text regions");
                Vec::new()
            }
        };
        let regions = match self.saliency.detect(frame).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "saliency failed — no candidate regions this frame");
                Vec::new()
            }
        };

        tracing::debug!(
            text_regions = texts.len(),
            salient_regions = regions.len(),
            "frame collaborators done"
        );

        let mut photos = Vec::new();
        for region in &regions {
            let bbox = Rect::from_normalized(region.bbox, frame_w, frame_h);
            if bbox.is_degenerate() {
                continue;
            }
            if overlay::is_contaminated(&bbox, &texts, &self.overlay) {
                tracing::debug!(?bbox, "candidate contaminated by UI text — skipped");
                continue;
            }
            let candidate = CandidatePhoto {
                image: crop(frame, &bbox),
                bbox,
            };
            photos.push(
                self.classify_and_score(frame, &frame_bounds, candidate, &texts)
                    .await,
            );
        }

        let text = texts
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(FrameExtraction { photos, text })
    }

    async fn classify_and_score(
        &self,
        frame: &DynamicImage,
        frame_bounds: &Rect,
        candidate: CandidatePhoto,
        texts: &[TextRegion],
    ) -> ScoredPhoto {
        let outcome = person::classify(self.detector.as_ref(), &candidate.image).await;
        let detection = outcome.detection().cloned();
        if matches!(outcome, DetectionOutcome::Failed) {
            tracing::debug!(bbox = ?candidate.bbox, "detection failure degraded to no person");
        }

        // Detection ran on the candidate crop; lift the primary box back into
        // frame coordinates before re-framing.
        let primary_in_frame = detection
            .as_ref()
            .and_then(|d| d.primary_person_box())
            .map(|b| b.translate(candidate.bbox.x, candidate.bbox.y));

        let (final_bbox, final_image) = match &primary_in_frame {
            Some(person_box) => {
                let reframed = person_centric_rect(
                    &candidate.bbox,
                    person_box,
                    frame_bounds,
                    texts,
                    &self.crop,
                    &self.overlay,
                );
                if reframed == candidate.bbox {
                    (candidate.bbox, candidate.image)
                } else {
                    (reframed, crop(frame, &reframed))
                }
            }
            None => (candidate.bbox, candidate.image),
        };

        let completeness = completeness_score(&final_bbox, primary_in_frame.as_ref());
        let (is_single, subfolder) = match detection.as_ref().map(|d| d.person_count) {
            Some(1) => (true, Subfolder::Person),
            Some(n) if n > 1 => (false, Subfolder::MultiPerson),
            _ => (false, Subfolder::Other),
        };

        ScoredPhoto {
            image: final_image,
            bbox: final_bbox,
            person_detection: detection,
            is_single_person: is_single,
            primary_person_box: primary_in_frame,
            completeness,
            subfolder,
        }
    }
}

fn crop(frame: &DynamicImage, bbox: &Rect) -> DynamicImage {
    let (x, y, w, h) = bbox.to_crop_window(frame.width(), frame.height());
    frame.crop_imm(x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FullFrameSaliency, NullTextRecognizer, SalientRegion};
    use crate::errors::ScrollCullError;
    use crate::perception::person::RawPersonBox;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedDetector(Vec<RawPersonBox>);

    #[async_trait]
    impl PersonDetector for FixedDetector {
        async fn detect(&self, _image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
            Ok(self.0.clone())
        }
    }

    struct FixedSaliency(Vec<SalientRegion>);

    #[async_trait]
    impl SaliencyDetector for FixedSaliency {
        async fn detect(&self, _frame: &DynamicImage) -> ScrollCullResult<Vec<SalientRegion>> {
            Ok(self.0.clone())
        }
    }

    struct FixedOcr(Vec<TextRegion>);

    #[async_trait]
    impl TextRecognizer for FixedOcr {
        async fn recognize(&self, _frame: &DynamicImage) -> ScrollCullResult<Vec<TextRegion>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSaliency;

    #[async_trait]
    impl SaliencyDetector for FailingSaliency {
        async fn detect(&self, _frame: &DynamicImage) -> ScrollCullResult<Vec<SalientRegion>> {
            Err(ScrollCullError::Detection("saliency down".into()))
        }
    }

    fn pipeline(
        ocr: Arc<dyn TextRecognizer>,
        saliency: Arc<dyn SaliencyDetector>,
        detector: Arc<dyn PersonDetector>,
    ) -> ExtractionPipeline {
        ExtractionPipeline {
            ocr,
            saliency,
            detector,
            overlay: OverlayConfig::default(),
            crop: CropConfig::default(),
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(400, 400)
    }

    #[tokio::test]
    async fn single_person_classified_and_scored() {
        let det = FixedDetector(vec![RawPersonBox {
            bbox: Rect::new(100.0, 100.0, 100.0, 200.0),
            confidence: 0.9,
        }]);
        let p = pipeline(
            Arc::new(NullTextRecognizer),
            Arc::new(FullFrameSaliency),
            Arc::new(det),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert_eq!(out.photos.len(), 1);
        let photo = &out.photos[0];
        assert!(photo.is_single_person);
        assert_eq!(photo.subfolder, Subfolder::Person);
        assert!(photo.completeness > 0.0 && photo.completeness <= 1.0);
        assert!(photo.primary_person_box.is_some());
        // Re-framed around the person, so tighter than the full frame.
        assert!(photo.bbox.area() < 400.0 * 400.0);
    }

    #[tokio::test]
    async fn multi_person_goes_to_multi_folder() {
        let det = FixedDetector(vec![
            RawPersonBox {
                bbox: Rect::new(10.0, 10.0, 80.0, 150.0),
                confidence: 0.8,
            },
            RawPersonBox {
                bbox: Rect::new(200.0, 10.0, 90.0, 150.0),
                confidence: 0.7,
            },
        ]);
        let p = pipeline(
            Arc::new(NullTextRecognizer),
            Arc::new(FullFrameSaliency),
            Arc::new(det),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert_eq!(out.photos.len(), 1);
        assert!(!out.photos[0].is_single_person);
        assert_eq!(out.photos[0].subfolder, Subfolder::MultiPerson);
    }

    #[tokio::test]
    async fn no_person_goes_to_other_with_zero_score() {
        let p = pipeline(
            Arc::new(NullTextRecognizer),
            Arc::new(FullFrameSaliency),
            Arc::new(FixedDetector(vec![])),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert_eq!(out.photos[0].subfolder, Subfolder::Other);
        assert_eq!(out.photos[0].completeness, 0.0);
    }

    #[tokio::test]
    async fn contaminated_candidate_is_skipped_but_text_kept() {
        let text = TextRegion {
            text: "Send a rose".into(),
            bbox: Rect::new(0.0, 0.0, 400.0, 200.0),
            confidence: 0.9,
        };
        let p = pipeline(
            Arc::new(FixedOcr(vec![text])),
            Arc::new(FullFrameSaliency),
            Arc::new(FixedDetector(vec![])),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert!(out.photos.is_empty());
        assert_eq!(out.text, "Send a rose");
    }

    #[tokio::test]
    async fn saliency_failure_degrades_to_empty_frame() {
        let p = pipeline(
            Arc::new(NullTextRecognizer),
            Arc::new(FailingSaliency),
            Arc::new(FixedDetector(vec![])),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert!(out.photos.is_empty());
    }

    #[tokio::test]
    async fn degenerate_salient_region_is_skipped() {
        let p = pipeline(
            Arc::new(NullTextRecognizer),
            Arc::new(FixedSaliency(vec![SalientRegion {
                bbox: [0.5, 0.5, 0.5, 0.9],
            }])),
            Arc::new(FixedDetector(vec![])),
        );
        let out = p.extract(&frame()).await.unwrap();
        assert!(out.photos.is_empty());
    }
}
