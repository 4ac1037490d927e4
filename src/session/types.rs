use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::DuplicateStatus;
use crate::geometry::Rect;
use crate::perception::extractor::Subfolder;
use crate::perception::person::PersonDetection;

/// Persisted record for one accepted photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub filename: String,
    pub bbox: Rect,
    pub scroll_index: u32,
    pub extracted_at: DateTime<Utc>,
    pub person_detection: Option<PersonDetection>,
    pub is_single_person: bool,
    pub primary_person_box: Option<Rect>,
    pub subfolder: Subfolder,
    pub duplicate_status: DuplicateStatus,
    pub completeness_score: f32,
    /// Set for `preferred` and `duplicate` records under the mark policy;
    /// names the competing file in the same result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

/// One completed scroll step, ordered by `scroll_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollCycleResult {
    pub scroll_index: u32,
    pub text: String,
    pub photo_count: usize,
}
