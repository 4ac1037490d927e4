//! Scroll-termination state machine.
//!
//! Drives repeated capture → scroll → capture cycles, extracting photos from
//! every "after" frame, until two consecutive cycles observe a near-identical
//! screen (profile end) or the hard cycle cap trips. Photos captured during
//! similar cycles are removed afterwards — they are near-certain re-captures
//! of content already seen, produced only because extraction runs before the
//! stability verdict for that cycle is known.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::collaborators::{FrameSource, Scroller};
use crate::dedup::DedupPolicy;
use crate::embedding::{frame_similarity, Embedder};
use crate::perception::extractor::ExtractionPipeline;
use crate::session::types::ScrollCycleResult;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPhase {
    Running,
    StableCounting,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Safety ceiling on cycles, not a success condition.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    /// Wait after issuing the scroll input before capturing the after frame.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Whole-frame similarity at or above which a cycle counts as stable.
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: f32,
    /// Consecutive stable cycles required to call the profile finished.
    #[serde(default = "default_required_stable_cycles")]
    pub required_stable_cycles: u32,
    /// Top band excluded from frame comparison; the status bar changes
    /// independently of content (e.g. the clock).
    #[serde(default = "default_status_bar_px")]
    pub status_bar_px: u32,
    /// Wheel amount passed to the scroll collaborator each cycle.
    #[serde(default = "default_scroll_amount")]
    pub scroll_amount: i32,
}

fn default_max_cycles() -> u32 {
    15
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_stability_threshold() -> f32 {
    0.85
}

fn default_required_stable_cycles() -> u32 {
    2
}

fn default_status_bar_px() -> u32 {
    40
}

fn default_scroll_amount() -> i32 {
    -5
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            settle_delay_ms: default_settle_delay_ms(),
            stability_threshold: default_stability_threshold(),
            required_stable_cycles: default_required_stable_cycles(),
            status_bar_px: default_status_bar_px(),
            scroll_amount: default_scroll_amount(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollOutcome {
    pub phase: ScrollPhase,
    pub cycles_run: u32,
    /// True when the loop ended on the cycle cap rather than stability.
    pub reached_cap: bool,
    pub similar_cycles: Vec<u32>,
    pub removed_in_cleanup: usize,
}

pub struct ScrollRunner {
    pub frames: Arc<dyn FrameSource>,
    pub scroller: Arc<dyn Scroller>,
    pub pipeline: ExtractionPipeline,
    pub embedder: Arc<dyn Embedder>,
    pub config: ScrollConfig,
    pub policy: DedupPolicy,
}

impl ScrollRunner {
    /// Run the capture→extract→compare loop to completion, accumulating into
    /// `ctx`. Nothing here is fatal: failures narrow a cycle's output, and a
    /// run that hits the cap still yields a best-effort result.
    pub async fn run(&self, ctx: &mut SessionContext) -> ScrollOutcome {
        let mut phase = ScrollPhase::Running;
        let mut consecutive_stable: u32 = 0;
        let mut similar_cycles: Vec<u32> = Vec::new();
        let mut cycles_run: u32 = 0;

        for cycle in 0..self.config.max_cycles {
            let before = match self.frames.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(cycle, error = %e, "before-frame capture failed — skipping cycle");
                    cycles_run = cycle + 1;
                    continue;
                }
            };

            if let Err(e) = self.scroller.scroll(self.config.scroll_amount).await {
                tracing::warn!(cycle, error = %e, "scroll input failed — comparing anyway");
            }
            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

            let after = match self.frames.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    // No after frame means no comparison baseline; treat as an
                    // unrecoverable capture error and keep what we have.
                    tracing::error!(cycle, error = %e, "after-frame capture failed — ending loop");
                    cycles_run = cycle + 1;
                    break;
                }
            };
            cycles_run = cycle + 1;

            let similarity = self.compare_frames(&before, &after);
            if similarity >= self.config.stability_threshold {
                consecutive_stable += 1;
                similar_cycles.push(cycle);
                phase = ScrollPhase::StableCounting;
                tracing::debug!(cycle, similarity, consecutive_stable, "stable cycle");
            } else {
                // No partial credit: the identical observations must be
                // back-to-back.
                consecutive_stable = 0;
                phase = ScrollPhase::Running;
                tracing::debug!(cycle, similarity, "content changed");
            }

            // Extraction runs every cycle, stability verdict or not.
            self.extract_cycle(ctx, cycle, &after).await;

            if consecutive_stable >= self.config.required_stable_cycles {
                tracing::info!(cycle, "profile end detected");
                phase = ScrollPhase::Done;
                break;
            }
        }

        let reached_cap = phase != ScrollPhase::Done;
        if reached_cap {
            tracing::warn!(
                cycles_run,
                "cycle cap reached without stability — keeping best-effort results"
            );
        }

        let removed_in_cleanup = ctx.cleanup_similar_cycles(&similar_cycles);

        ScrollOutcome {
            phase,
            cycles_run,
            reached_cap,
            similar_cycles,
            removed_in_cleanup,
        }
    }

    async fn extract_cycle(&self, ctx: &mut SessionContext, cycle: u32, after: &DynamicImage) {
        let extraction = match self.pipeline.extract(after).await {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(cycle, error = %err, "extraction failed — no photos this cycle");
                return;
            }
        };

        ctx.cycles.push(ScrollCycleResult {
            scroll_index: cycle,
            text: extraction.text.clone(),
            photo_count: extraction.photos.len(),
        });

        for (i, photo) in extraction.photos.iter().enumerate() {
            if let Err(e) = ctx.commit_photo(photo, cycle, i, self.policy, self.embedder.as_ref()) {
                tracing::warn!(cycle, photo = i, error = %e, "photo commit failed");
            }
        }
    }

    /// Whole-frame similarity with the top status-bar band cropped out of
    /// both frames first.
    fn compare_frames(&self, before: &DynamicImage, after: &DynamicImage) -> f32 {
        let a = strip_status_bar(before, self.config.status_bar_px);
        let b = strip_status_bar(after, self.config.status_bar_px);
        match (self.embedder.embed(&a), self.embedder.embed(&b)) {
            (Ok(ea), Ok(eb)) => frame_similarity(&ea, &eb),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "frame embedding failed — treating cycle as dissimilar");
                0.0
            }
        }
    }
}

fn strip_status_bar(frame: &DynamicImage, band_px: u32) -> DynamicImage {
    let (w, h) = (frame.width(), frame.height());
    if band_px == 0 || band_px >= h {
        return frame.clone();
    }
    frame.crop_imm(0, band_px, w, h - band_px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        FullFrameSaliency, NullTextRecognizer, PersonDetector,
    };
    use crate::embedding::Embedding;
    use crate::errors::{ScrollCullError, ScrollCullResult};
    use crate::perception::cropper::CropConfig;
    use crate::perception::overlay::OverlayConfig;
    use crate::perception::person::RawPersonBox;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Scripted frame source: each entry is a solid frame pixel value, or
    /// `None` for a capture failure. The last entry repeats once exhausted.
    struct ScriptedFrames {
        script: Vec<Option<u8>>,
        cursor: Mutex<usize>,
    }

    impl ScriptedFrames {
        fn new(script: Vec<Option<u8>>) -> Self {
            Self {
                script,
                cursor: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedFrames {
        async fn capture(&self) -> ScrollCullResult<DynamicImage> {
            let mut cursor = self.cursor.lock().unwrap();
            let idx = (*cursor).min(self.script.len() - 1);
            *cursor += 1;
            match self.script[idx] {
                Some(px) => Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                    8,
                    8,
                    Rgb([px, 0, 0]),
                ))),
                None => Err(ScrollCullError::Capture("scripted failure".into())),
            }
        }
    }

    struct NoopScroller;

    #[async_trait]
    impl Scroller for NoopScroller {
        async fn scroll(&self, _amount: i32) -> ScrollCullResult<()> {
            Ok(())
        }
    }

    struct NoPersons;

    #[async_trait]
    impl PersonDetector for NoPersons {
        async fn detect(&self, _image: &DynamicImage) -> ScrollCullResult<Vec<RawPersonBox>> {
            Ok(vec![])
        }
    }

    /// Embeds by the red channel of pixel (0,0): identical frames are
    /// distance 0, opposite bytes distance 1.
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn embed(&self, image: &DynamicImage) -> ScrollCullResult<Embedding> {
            let px = image.to_rgb8().get_pixel(0, 0).0[0];
            Ok(Embedding::from_bytes(&[px]).unwrap())
        }
    }

    fn runner(script: Vec<Option<u8>>, max_cycles: u32) -> ScrollRunner {
        ScrollRunner {
            frames: Arc::new(ScriptedFrames::new(script)),
            scroller: Arc::new(NoopScroller),
            pipeline: ExtractionPipeline {
                ocr: Arc::new(NullTextRecognizer),
                saliency: Arc::new(FullFrameSaliency),
                detector: Arc::new(NoPersons),
                overlay: OverlayConfig::default(),
                crop: CropConfig::default(),
            },
            embedder: Arc::new(StubEmbedder),
            config: ScrollConfig {
                max_cycles,
                settle_delay_ms: 0,
                status_bar_px: 0,
                ..Default::default()
            },
            policy: DedupPolicy::Replace,
        }
    }

    fn ctx() -> (tempfile::TempDir, SessionContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::create(Some(dir.path().to_path_buf()), 0.4).unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn two_identical_cycles_finish_and_clean_up() {
        // Every frame identical: cycles 0 and 1 are both stable.
        let (_dir, mut ctx) = ctx();
        let outcome = runner(vec![Some(0x10)], 15).run(&mut ctx).await;

        assert_eq!(outcome.phase, ScrollPhase::Done);
        assert_eq!(outcome.cycles_run, 2);
        assert!(!outcome.reached_cap);
        assert_eq!(outcome.similar_cycles, vec![0, 1]);
        // One photo extracted per cycle, both removed as re-captures.
        assert_eq!(outcome.removed_in_cleanup, 2);
        assert!(ctx.metadata.is_empty());
        assert_eq!(ctx.cycles.len(), 2);
    }

    #[tokio::test]
    async fn changing_content_runs_to_the_cap() {
        // before/after always differ: 0x00 vs 0xFF alternating.
        let script = (0..8).map(|i| Some(if i % 2 == 0 { 0x00 } else { 0xFF })).collect();
        let (_dir, mut ctx) = ctx();
        let outcome = runner(script, 3).run(&mut ctx).await;

        assert_eq!(outcome.cycles_run, 3);
        assert!(outcome.reached_cap);
        assert!(outcome.similar_cycles.is_empty());
        assert_eq!(outcome.removed_in_cleanup, 0);
        assert_eq!(ctx.metadata.len(), 3);
    }

    #[tokio::test]
    async fn dissimilar_cycle_resets_the_counter() {
        // c0 (A,A) stable; c1 (A,B) reset; c2 (B,B) stable; c3 (B,B) stable → done.
        let script = vec![
            Some(0xAA),
            Some(0xAA),
            Some(0xAA),
            Some(0x55),
            Some(0x55),
        ];
        let (_dir, mut ctx) = ctx();
        let outcome = runner(script, 15).run(&mut ctx).await;

        assert_eq!(outcome.phase, ScrollPhase::Done);
        assert_eq!(outcome.cycles_run, 4);
        assert_eq!(outcome.similar_cycles, vec![0, 2, 3]);
        // Only the dissimilar cycle's photo survives cleanup.
        assert_eq!(ctx.metadata.len(), 1);
        assert_eq!(ctx.metadata[0].scroll_index, 1);
    }

    #[tokio::test]
    async fn before_capture_failure_skips_the_cycle() {
        // c0 before fails; later cycles stabilize normally.
        let script = vec![None, Some(0x10)];
        let (_dir, mut ctx) = ctx();
        let outcome = runner(script, 15).run(&mut ctx).await;

        assert_eq!(outcome.phase, ScrollPhase::Done);
        // Cycle 0 skipped (no extraction), cycles 1 and 2 stable.
        assert_eq!(outcome.cycles_run, 3);
        assert_eq!(ctx.cycles.len(), 2);
        assert_eq!(outcome.similar_cycles, vec![1, 2]);
    }

    #[tokio::test]
    async fn after_capture_failure_ends_the_loop() {
        // c0 completes (dissimilar); c1 after-frame capture fails.
        let script = vec![Some(0x00), Some(0xFF), Some(0xFF), None];
        let (_dir, mut ctx) = ctx();
        let outcome = runner(script, 15).run(&mut ctx).await;

        assert!(outcome.reached_cap);
        assert_eq!(outcome.cycles_run, 2);
        // Cycle 0's extraction is preserved.
        assert_eq!(ctx.metadata.len(), 1);
    }
}
