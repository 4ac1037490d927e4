pub mod capture;
pub mod collaborators;
pub mod config;
pub mod decision;
pub mod dedup;
pub mod embedding;
pub mod errors;
pub mod geometry;
pub mod input;
pub mod perception;
pub mod scroll;
pub mod session;
pub mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::capture::ScreenFrameSource;
use crate::collaborators::{FullFrameSaliency, NullPersonDetector, NullTextRecognizer, PersonDetector};
use crate::config::AppConfig;
use crate::decision::{evaluate_filter, fallback_decision, FilterVerdict};
use crate::embedding::PerceptualEmbedder;
use crate::errors::ScrollCullResult;
use crate::input::WheelScroller;
use crate::perception::extractor::ExtractionPipeline;
use crate::perception::yolo_person::YoloPersonDetector;
use crate::scroll::{ScrollOutcome, ScrollRunner};
use crate::session::SessionContext;
use crate::vision::{OpenAiCompatibleVisionJudge, VisionJudge, VisionVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// Filter enforced before any verdict was sought.
    Filtered,
    /// Remote vision model.
    Vision,
    /// Local tiered decision policy.
    Fallback,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub session_root: PathBuf,
    pub like: bool,
    pub verdict_source: VerdictSource,
    pub filter: FilterVerdict,
    pub vision: Option<VisionVerdict>,
    pub cycles_run: u32,
    pub reached_cap: bool,
    pub photos_kept: usize,
}

/// Run one full profile scan: scroll to the end of the profile, extract and
/// deduplicate photos, then produce a like/pass verdict.
pub async fn run_session(config: &AppConfig) -> ScrollCullResult<SessionReport> {
    let mut ctx =
        SessionContext::create(config.session.base_dir.clone(), config.dedup.threshold)?;

    let detector: Arc<dyn PersonDetector> = match YoloPersonDetector::try_new(&config.detector) {
        Some(d) => Arc::new(d),
        None => Arc::new(NullPersonDetector),
    };

    let runner = ScrollRunner {
        frames: Arc::new(ScreenFrameSource),
        scroller: Arc::new(WheelScroller),
        pipeline: ExtractionPipeline {
            ocr: Arc::new(NullTextRecognizer),
            saliency: Arc::new(FullFrameSaliency),
            detector,
            overlay: config.overlay.clone(),
            crop: config.crop.clone(),
        },
        embedder: Arc::new(PerceptualEmbedder::new()),
        config: config.scroll.clone(),
        policy: config.dedup.policy,
    };

    let outcome = runner.run(&mut ctx).await;
    ctx.finish()?;

    let report = decide(config, &ctx, &outcome).await;
    write_report(&ctx, &report);
    Ok(report)
}

async fn decide(config: &AppConfig, ctx: &SessionContext, outcome: &ScrollOutcome) -> SessionReport {
    let filter = evaluate_filter(&ctx.metadata, config.decision.min_solo_photos);

    let (like, verdict_source, vision) = if config.decision.enforce_filter && filter.should_filter
    {
        tracing::info!(reason = %filter.reason, "profile filtered — passing");
        (false, VerdictSource::Filtered, None)
    } else if let Some(vision_cfg) = &config.vision {
        match try_vision(vision_cfg, ctx).await {
            Ok(verdict) => (verdict.like, VerdictSource::Vision, Some(verdict)),
            Err(e) => {
                tracing::warn!(error = %e, "vision verdict failed — using fallback policy");
                let (like, _) = fallback_decision(
                    &ctx.metadata,
                    config.decision.min_solo_photos,
                    config.decision.enforce_filter,
                );
                (like, VerdictSource::Fallback, None)
            }
        }
    } else {
        let (like, _) = fallback_decision(
            &ctx.metadata,
            config.decision.min_solo_photos,
            config.decision.enforce_filter,
        );
        (like, VerdictSource::Fallback, None)
    };

    SessionReport {
        session_id: ctx.session_id.clone(),
        session_root: ctx.root.clone(),
        like,
        verdict_source,
        filter,
        vision,
        cycles_run: outcome.cycles_run,
        reached_cap: outcome.reached_cap,
        photos_kept: ctx.metadata.len(),
    }
}

async fn try_vision(
    vision_cfg: &crate::vision::VisionConfig,
    ctx: &SessionContext,
) -> ScrollCullResult<VisionVerdict> {
    let judge = OpenAiCompatibleVisionJudge::from_config(vision_cfg)?;
    judge
        .judge(&ctx.person_dir(), &ctx.ocr_text(), &vision_cfg.criterion)
        .await
}

fn write_report(ctx: &SessionContext, report: &SessionReport) {
    let path = ctx.root.join("report.json");
    match serde_json::to_string_pretty(report) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                tracing::warn!(error = %e, path = %path.display(), "failed to write report");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to serialize report"),
    }
}
