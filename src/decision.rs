//! Decision policy: filter verdict plus the tiered like/pass fallback used
//! when no remote vision verdict is available.

use serde::{Deserialize, Serialize};

use crate::session::types::PhotoMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Minimum solo photos a profile needs to escape filtering.
    #[serde(default = "default_min_solo_photos")]
    pub min_solo_photos: usize,
    /// When true, a filtered profile is never liked, vision verdict or not.
    #[serde(default = "default_enforce_filter")]
    pub enforce_filter: bool,
}

fn default_min_solo_photos() -> usize {
    2
}

fn default_enforce_filter() -> bool {
    true
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_solo_photos: default_min_solo_photos(),
            enforce_filter: default_enforce_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterVerdict {
    pub should_filter: bool,
    pub reason: String,
    pub solo_photo_count: usize,
    pub total_photo_count: usize,
}

/// Count solo photos and flag the profile when there are too few.
pub fn evaluate_filter(metadata: &[PhotoMetadata], min_solo_photos: usize) -> FilterVerdict {
    let solo = metadata.iter().filter(|m| m.is_single_person).count();
    let total = metadata.len();
    let should_filter = solo < min_solo_photos;
    let reason = if should_filter {
        format!("only {solo} solo photo(s), need {min_solo_photos}")
    } else {
        format!("{solo} solo photo(s) of {total}")
    };
    FilterVerdict {
        should_filter,
        reason,
        solo_photo_count: solo,
        total_photo_count: total,
    }
}

/// Like/pass signal from aggregated metadata alone.
///
/// Solo photos are strong positive evidence, so the person-ratio bar drops
/// as the solo count rises: ≥2 solo → ratio > 0.4, exactly 1 → > 0.6,
/// none → > 0.8. No photos at all is an unconditional pass.
pub fn fallback_decision(
    metadata: &[PhotoMetadata],
    min_solo_photos: usize,
    enforce_filter: bool,
) -> (bool, FilterVerdict) {
    let verdict = evaluate_filter(metadata, min_solo_photos);

    if enforce_filter && verdict.should_filter {
        tracing::info!(reason = %verdict.reason, "filter enforced — passing");
        return (false, verdict);
    }

    let total = metadata.len();
    if total == 0 {
        return (false, verdict);
    }

    let with_person = metadata
        .iter()
        .filter(|m| {
            m.person_detection
                .as_ref()
                .map(|d| d.has_person)
                .unwrap_or(false)
        })
        .count();
    let person_ratio = with_person as f32 / total as f32;

    let required = if verdict.solo_photo_count >= 2 {
        0.4
    } else if verdict.solo_photo_count == 1 {
        0.6
    } else {
        0.8
    };

    let like = person_ratio > required;
    tracing::info!(
        person_ratio,
        required,
        solo = verdict.solo_photo_count,
        like,
        "fallback decision"
    );
    (like, verdict)
}
