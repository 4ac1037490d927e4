//! Screen capture: the bundled `FrameSource` for live runs.

use async_trait::async_trait;
use image::DynamicImage;

use crate::collaborators::FrameSource;
use crate::errors::{ScrollCullError, ScrollCullResult};

/// Captures the first available monitor via `xcap`. Monitors are enumerated
/// per call so a display change between cycles does not hold a stale handle.
pub struct ScreenFrameSource;

#[async_trait]
impl FrameSource for ScreenFrameSource {
    async fn capture(&self) -> ScrollCullResult<DynamicImage> {
        // Capture is a blocking OS call.
        tokio::task::spawn_blocking(|| -> ScrollCullResult<DynamicImage> {
            let monitors = xcap::Monitor::all()
                .map_err(|e| ScrollCullError::Capture(format!("monitor enumeration: {e}")))?;
            let monitor = monitors
                .into_iter()
                .next()
                .ok_or_else(|| ScrollCullError::Capture("no monitor available".into()))?;
            let rgba = monitor
                .capture_image()
                .map_err(|e| ScrollCullError::Capture(format!("capture: {e}")))?;
            Ok(DynamicImage::ImageRgba8(rgba))
        })
        .await
        .map_err(|e| ScrollCullError::Capture(format!("join: {e}")))?
    }
}
