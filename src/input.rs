//! Physical input simulation: the bundled `Scroller` for live runs.

use async_trait::async_trait;
use enigo::{Axis, Enigo, Mouse, Settings};

use crate::collaborators::Scroller;
use crate::errors::{ScrollCullError, ScrollCullResult};

/// Vertical mouse-wheel scroll via `enigo`. Negative amounts scroll down on
/// most platforms; the sign convention is left to configuration.
pub struct WheelScroller;

#[async_trait]
impl Scroller for WheelScroller {
    async fn scroll(&self, amount: i32) -> ScrollCullResult<()> {
        tokio::task::spawn_blocking(move || -> ScrollCullResult<()> {
            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| ScrollCullError::Input(format!("enigo init: {e}")))?;
            enigo
                .scroll(amount, Axis::Vertical)
                .map_err(|e| ScrollCullError::Input(format!("scroll: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| ScrollCullError::Input(format!("join: {e}")))?
    }
}
