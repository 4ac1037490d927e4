//! Remote vision verdict: sends the session's person photos plus profile
//! text to an OpenAI-compatible vision endpoint and parses a like/pass
//! decision. The tiered fallback policy covers any failure here.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::{ScrollCullError, ScrollCullResult};

const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Full chat-completions URL.
    pub api_base: String,
    pub model: String,
    /// Falls back to the `SCROLLCULL_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    /// User-supplied evaluation criterion, passed through verbatim.
    pub criterion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionVerdict {
    pub like: bool,
    pub decision: String,
    pub reasoning: String,
    pub confidence: Option<f32>,
    pub photo_count: usize,
}

#[async_trait]
pub trait VisionJudge: Send + Sync {
    async fn judge(
        &self,
        photos_dir: &Path,
        ocr_text: &str,
        criterion: &str,
    ) -> ScrollCullResult<VisionVerdict>;
}

pub struct OpenAiCompatibleVisionJudge {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleVisionJudge {
    pub fn from_config(config: &VisionConfig) -> ScrollCullResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("SCROLLCULL_API_KEY").ok())
            .ok_or_else(|| {
                ScrollCullError::Config(
                    "vision api key missing (config or SCROLLCULL_API_KEY)".into(),
                )
            })?;
        Ok(Self {
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl VisionJudge for OpenAiCompatibleVisionJudge {
    async fn judge(
        &self,
        photos_dir: &Path,
        ocr_text: &str,
        criterion: &str,
    ) -> ScrollCullResult<VisionVerdict> {
        let photos = load_photos(photos_dir)?;
        if photos.is_empty() {
            return Ok(VisionVerdict {
                like: false,
                decision: "NO".into(),
                reasoning: "No photos available for analysis".into(),
                confidence: None,
                photo_count: 0,
            });
        }

        let prompt = build_prompt(criterion, ocr_text);
        let mut content = vec![serde_json::json!({ "type": "text", "text": prompt })];
        for b64 in &photos {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/jpeg;base64,{b64}") }
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": 500,
            "temperature": 0.1,
        });

        // Base64 payloads are deliberately not logged.
        tracing::debug!(model = %self.model, photos = photos.len(), "sending vision request");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(ScrollCullError::Vision(format!("{status}: {err_body}")));
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ScrollCullError::Vision("response missing message content".into()))?;

        Ok(parse_verdict(text, photos.len()))
    }
}

/// Photos eligible for the vision call: supported image files that are not
/// tagged as duplicate or superseded variants.
fn is_candidate_photo(name: &str) -> bool {
    let lower = name.to_lowercase();
    let Some(ext) = lower.rsplit_once('.').map(|(_, e)| e) else {
        return false;
    };
    SUPPORTED_EXTENSIONS.contains(&ext)
        && !lower.contains("-duplicate")
        && !lower.contains("-superseded")
}

/// Cycle and photo indices from a `scroll_<c>_photo_<n>` filename.
/// Unparseable names sort after every parseable one.
fn scroll_order(name: &str) -> (u32, u32) {
    let parsed = || {
        let stem = name.strip_prefix("scroll_")?;
        let (cycle, rest) = stem.split_once("_photo_")?;
        let photo = rest.split(['.', '-']).next()?;
        Some((cycle.parse().ok()?, photo.parse().ok()?))
    };
    parsed().unwrap_or((u32::MAX, u32::MAX))
}

fn load_photos(photos_dir: &Path) -> ScrollCullResult<Vec<String>> {
    let mut entries: Vec<(String, std::path::PathBuf)> = std::fs::read_dir(photos_dir)?
        .filter_map(Result::ok)
        .filter_map(|e| {
            let path = e.path();
            let name = path.file_name()?.to_str()?.to_string();
            is_candidate_photo(&name).then_some((name, path))
        })
        .collect();
    // Lexicographic order would put scroll_10 before scroll_2.
    entries.sort_by(|(a, _), (b, _)| scroll_order(a).cmp(&scroll_order(b)).then_with(|| a.cmp(b)));

    let mut photos = Vec::new();
    for (_, path) in entries {
        match std::fs::read(&path) {
            Ok(bytes) => {
                photos.push(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable photo"),
        }
    }
    Ok(photos)
}

fn build_prompt(criterion: &str, ocr_text: &str) -> String {
    let mut prompt = format!(
        "Evaluate the attached profile photos against the following criterion:\n\n\
         {criterion}\n\n"
    );
    if !ocr_text.trim().is_empty() {
        prompt.push_str(&format!(
            "This is the text scraped from the profile, unaltered; weight it \
             lightly as the formatting may be hard to parse:\n\n{ocr_text}\n\n"
        ));
    }
    prompt.push_str(
        "Respond in JSON with fields:\n\
         - \"decision\": \"YES\" or \"NO\"\n\
         - \"reasoning\": 2-3 sentences\n\
         - \"confidence\": 0.0 to 1.0\n",
    );
    prompt
}

#[derive(Deserialize)]
struct RawVerdict {
    decision: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse the model reply as JSON, falling back to a plain-text YES scan when
/// the model ignores the format.
fn parse_verdict(text: &str, photo_count: usize) -> VisionVerdict {
    let trimmed = text.trim().trim_start_matches("```json").trim_matches('`');
    if let Ok(raw) = serde_json::from_str::<RawVerdict>(trimmed.trim()) {
        let like = raw.decision.eq_ignore_ascii_case("yes");
        return VisionVerdict {
            like,
            decision: raw.decision,
            reasoning: raw.reasoning,
            confidence: raw.confidence,
            photo_count,
        };
    }

    let like = text.to_uppercase().contains("YES");
    VisionVerdict {
        like,
        decision: if like { "YES".into() } else { "NO".into() },
        reasoning: text.trim().to_string(),
        confidence: Some(0.5),
        photo_count,
    }
}
