//! Person detection wrapper: single-vs-multi classification and
//! primary-person selection on top of a `PersonDetector` collaborator.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::collaborators::PersonDetector;
use crate::geometry::Rect;

/// One raw box from the detection collaborator, in pixel space of the image
/// it was run on.
#[derive(Debug, Clone, Copy)]
pub struct RawPersonBox {
    pub bbox: Rect,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonDetection {
    pub has_person: bool,
    pub person_count: usize,
    /// Mean per-detection confidence; 0.0 when no person was found.
    pub confidence: f32,
    pub person_boxes: Vec<Rect>,
}

impl PersonDetection {
    pub fn from_boxes(boxes: &[RawPersonBox]) -> Self {
        let person_count = boxes.len();
        let confidence = if person_count == 0 {
            0.0
        } else {
            boxes.iter().map(|b| b.confidence).sum::<f32>() / person_count as f32
        };
        Self {
            has_person: person_count > 0,
            person_count,
            confidence,
            person_boxes: boxes.iter().map(|b| b.bbox).collect(),
        }
    }

    pub fn is_single_person(&self) -> bool {
        self.person_count == 1
    }

    /// The largest detected box. Ties break to the lowest original index, so
    /// the choice is deterministic for a given detection order.
    pub fn primary_person_box(&self) -> Option<Rect> {
        let mut best: Option<(f32, Rect)> = None;
        for bbox in &self.person_boxes {
            let area = bbox.area();
            match best {
                Some((best_area, _)) if area <= best_area => {}
                _ => best = Some((area, *bbox)),
            }
        }
        best.map(|(_, bbox)| bbox)
    }
}

/// Detection result kept as a sum so telemetry can distinguish a collaborator
/// failure from a genuine empty frame; both receive the same downstream
/// treatment.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    Detected(PersonDetection),
    NotDetected,
    Failed,
}

impl DetectionOutcome {
    pub fn detection(&self) -> Option<&PersonDetection> {
        match self {
            DetectionOutcome::Detected(d) => Some(d),
            _ => None,
        }
    }
}

/// Run the detector on an image. Collaborator errors degrade to `Failed`
/// (treated as "no person") rather than aborting the pipeline.
pub async fn classify(detector: &dyn PersonDetector, image: &DynamicImage) -> DetectionOutcome {
    match detector.detect(image).await {
        Ok(boxes) if boxes.is_empty() => DetectionOutcome::NotDetected,
        Ok(boxes) => DetectionOutcome::Detected(PersonDetection::from_boxes(&boxes)),
        Err(e) => {
            tracing::warn!(error = %e, "person detection failed — treating as no person");
            DetectionOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ScrollCullError, ScrollCullResult};
    use async_trait::async_trait;

    struct FixedDetector(Vec<RawPersonBox>);

    #[async_trait]
    impl PersonDetector for FixedDetector {
        async fn detect(&self, _image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl PersonDetector for FailingDetector {
        async fn detect(&self, _image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
            Err(ScrollCullError::Detection("model exploded".into()))
        }
    }

    fn raw(x: f32, y: f32, w: f32, h: f32, conf: f32) -> RawPersonBox {
        RawPersonBox {
            bbox: Rect::new(x, y, w, h),
            confidence: conf,
        }
    }

    #[test]
    fn mean_confidence_and_counts() {
        let det = PersonDetection::from_boxes(&[
            raw(0.0, 0.0, 10.0, 10.0, 0.8),
            raw(20.0, 0.0, 10.0, 10.0, 0.6),
        ]);
        assert!(det.has_person);
        assert_eq!(det.person_count, 2);
        assert!((det.confidence - 0.7).abs() < 1e-6);
        assert!(!det.is_single_person());
        assert_eq!(det.person_boxes.len(), det.person_count);
    }

    #[test]
    fn empty_detection_reports_zero_confidence() {
        let det = PersonDetection::from_boxes(&[]);
        assert!(!det.has_person);
        assert_eq!(det.person_count, 0);
        assert_eq!(det.confidence, 0.0);
    }

    #[test]
    fn primary_box_is_max_area_lowest_index_on_tie() {
        let det = PersonDetection::from_boxes(&[
            raw(0.0, 0.0, 10.0, 10.0, 0.9),
            raw(50.0, 0.0, 20.0, 20.0, 0.5),
            raw(0.0, 50.0, 20.0, 20.0, 0.7),
        ]);
        // Second and third tie on area; second wins by index.
        assert_eq!(det.primary_person_box(), Some(Rect::new(50.0, 0.0, 20.0, 20.0)));
    }

    #[tokio::test]
    async fn collaborator_failure_degrades_to_failed() {
        let img = DynamicImage::new_rgb8(4, 4);
        let outcome = classify(&FailingDetector, &img).await;
        assert!(matches!(outcome, DetectionOutcome::Failed));
        assert!(outcome.detection().is_none());
    }

    #[tokio::test]
    async fn empty_result_is_not_detected() {
        let img = DynamicImage::new_rgb8(4, 4);
        let outcome = classify(&FixedDetector(vec![]), &img).await;
        assert!(matches!(outcome, DetectionOutcome::NotDetected));
    }
}
