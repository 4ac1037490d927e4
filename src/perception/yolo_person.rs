//! ONNX YOLOv8 person detection.
//!
//! Loads a COCO-trained YOLOv8 model and keeps only class 0 (person).
//! Falls back gracefully if the model file is missing — the pipeline then
//! classifies every candidate as person-less.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use crate::collaborators::PersonDetector;
use crate::errors::{ScrollCullError, ScrollCullResult};
use crate::geometry::Rect;
use crate::perception::person::RawPersonBox;

/// COCO class index for "person".
const PERSON_CLASS: usize = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_model_path() -> String {
    "models/yolov8n.onnx".into()
}

fn default_conf_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.45
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            conf_threshold: default_conf_threshold(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

/// Holds the ONNX Runtime session and inference configuration.
pub struct YoloPersonDetector {
    session: Arc<Mutex<Session>>,
    input_size: u32,
    conf_threshold: f32,
    iou_threshold: f32,
}

impl YoloPersonDetector {
    /// Try to construct a detector. Returns `None` if the model file does not
    /// exist or fails to load.
    pub fn try_new(config: &DetectorConfig) -> Option<Self> {
        if !Path::new(&config.model_path).exists() {
            tracing::warn!(path = %config.model_path, "YOLO model not found — person detection disabled");
            return None;
        }
        match Self::build(config) {
            Ok(det) => {
                tracing::info!(path = %config.model_path, "YOLO person detector loaded");
                Some(det)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load YOLO model");
                None
            }
        }
    }

    fn build(config: &DetectorConfig) -> ScrollCullResult<Self> {
        let session = Session::builder()
            .map_err(|e| ScrollCullError::Detection(format!("ort session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ScrollCullError::Detection(format!("ort opt-level: {e}")))?
            .commit_from_file(&config.model_path)
            .map_err(|e| ScrollCullError::Detection(format!("ort load model: {e}")))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_size: 640,
            conf_threshold: config.conf_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    fn detect_blocking(&self, img: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
        let (orig_w, orig_h) = (img.width(), img.height());
        let (input_tensor, pad_x, pad_y, scale) = self.preprocess(img);

        let input_value = Tensor::from_array(input_tensor)
            .map_err(|e| ScrollCullError::Detection(format!("ort tensor: {e}")))?;

        let output_owned = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| ScrollCullError::Detection("ort session poisoned".into()))?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(|e| ScrollCullError::Detection(format!("ort run: {e}")))?;

            outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| ScrollCullError::Detection(format!("extract tensor: {e}")))?
                .to_owned()
        };

        self.postprocess(&output_owned.view(), orig_w, orig_h, pad_x, pad_y, scale)
    }

    /// Resize + letterbox + normalise → NCHW f32 tensor.
    fn preprocess(&self, img: &DynamicImage) -> (Array4<f32>, f32, f32, f32) {
        let sz = self.input_size;
        let (ow, oh) = (img.width() as f32, img.height() as f32);
        let scale = (sz as f32 / ow).min(sz as f32 / oh);
        let nw = (ow * scale).round() as u32;
        let nh = (oh * scale).round() as u32;
        let pad_x = (sz - nw) as f32 / 2.0;
        let pad_y = (sz - nh) as f32 / 2.0;

        let resized = img.resize_exact(nw, nh, image::imageops::FilterType::CatmullRom);
        let rgb = resized.to_rgb8();

        let mut canvas = image::RgbImage::from_pixel(sz, sz, image::Rgb([114, 114, 114]));
        image::imageops::overlay(&mut canvas, &rgb, pad_x.round() as i64, pad_y.round() as i64);

        let mut tensor = Array4::<f32>::zeros((1, 3, sz as usize, sz as usize));
        for y in 0..sz {
            for x in 0..sz {
                let p = canvas.get_pixel(x, y);
                tensor[[0, 0, y as usize, x as usize]] = p[0] as f32 / 255.0;
                tensor[[0, 1, y as usize, x as usize]] = p[1] as f32 / 255.0;
                tensor[[0, 2, y as usize, x as usize]] = p[2] as f32 / 255.0;
            }
        }

        (tensor, pad_x, pad_y, scale)
    }

    /// YOLOv8 output is `[1, 4+num_classes, num_proposals]`. Keep person-class
    /// proposals above the confidence threshold, undo the letterbox into
    /// original pixel space, then greedy NMS.
    fn postprocess(
        &self,
        output: &ndarray::ArrayViewD<f32>,
        orig_w: u32,
        orig_h: u32,
        pad_x: f32,
        pad_y: f32,
        scale: f32,
    ) -> ScrollCullResult<Vec<RawPersonBox>> {
        let (num_classes, num_preds) = output_dims(output.shape())?;

        let mut detections: Vec<RawPersonBox> = Vec::new();
        for i in 0..num_preds {
            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];

            // Best class must be "person".
            let mut max_score = 0.0f32;
            let mut max_class = 0usize;
            for c in 0..num_classes {
                let s = output[[0, 4 + c, i]];
                if s > max_score {
                    max_score = s;
                    max_class = c;
                }
            }
            if max_class != PERSON_CLASS || max_score < self.conf_threshold {
                continue;
            }

            let x1 = (((cx - w / 2.0) - pad_x) / scale).clamp(0.0, orig_w as f32);
            let y1 = (((cy - h / 2.0) - pad_y) / scale).clamp(0.0, orig_h as f32);
            let x2 = (((cx + w / 2.0) - pad_x) / scale).clamp(0.0, orig_w as f32);
            let y2 = (((cy + h / 2.0) - pad_y) / scale).clamp(0.0, orig_h as f32);

            detections.push(RawPersonBox {
                bbox: Rect::from_corners(x1, y1, x2, y2),
                confidence: max_score,
            });
        }

        Ok(nms(&detections, self.iou_threshold))
    }
}

/// `(num_classes, num_proposals)` from a `[1, 4+num_classes, num_proposals]`
/// output shape. Needs at least one class channel past the 4 box channels.
fn output_dims(shape: &[usize]) -> ScrollCullResult<(usize, usize)> {
    if shape.len() < 3 || shape[1] < 5 {
        return Err(ScrollCullError::Detection(format!(
            "unexpected output shape: {shape:?}"
        )));
    }
    Ok((shape[1] - 4, shape[2]))
}

/// Greedy NMS over person boxes.
fn nms(dets: &[RawPersonBox], iou_threshold: f32) -> Vec<RawPersonBox> {
    let mut indices: Vec<usize> = (0..dets.len()).collect();
    indices.sort_by(|&a, &b| {
        dets[b]
            .confidence
            .partial_cmp(&dets[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for &i in &indices {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for &j in &indices {
            if suppressed[j] || i == j {
                continue;
            }
            if dets[i].bbox.iou(&dets[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

#[async_trait]
impl PersonDetector for YoloPersonDetector {
    async fn detect(&self, image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
        // Inference is CPU-intensive — keep it off the async runtime.
        let this = Self {
            session: Arc::clone(&self.session),
            input_size: self.input_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
        };
        let image = image.clone();
        tokio::task::spawn_blocking(move || this.detect_blocking(&image))
            .await
            .map_err(|e| ScrollCullError::Detection(format!("join: {e}")))?
    }
}
