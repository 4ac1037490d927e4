use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::decision::DecisionConfig;
use crate::dedup::DedupConfig;
use crate::errors::{ScrollCullError, ScrollCullResult};
use crate::perception::cropper::CropConfig;
use crate::perception::overlay::OverlayConfig;
use crate::perception::yolo_person::DetectorConfig;
use crate::scroll::ScrollConfig;
use crate::vision::VisionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub crop: CropConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Remote vision verdict; the tiered fallback policy applies when absent.
    #[serde(default)]
    pub vision: Option<VisionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Base directory for session output. Defaults to the user documents
    /// directory (falling back to the working directory).
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

fn resolve_config_path() -> ScrollCullResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(ScrollCullError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> ScrollCullResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Path used when no config file exists yet: next to the executable, or the
/// working directory as a last resort.
fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.toml")))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

pub fn save_config(config: &AppConfig) -> ScrollCullResult<()> {
    let path = resolve_config_path().unwrap_or_else(|_| default_config_path());
    save_config_to(&path, config)
}

pub fn save_config_to(path: &std::path::Path, config: &AppConfig) -> ScrollCullResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
