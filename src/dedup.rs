//! Session-scoped duplicate detection cache.
//!
//! Holds one embedding per unique person photo accepted so far. For each new
//! single-person photo the cache resolves the replace/mark policy into a
//! [`Resolution`] value; the session store executes the file side effects.
//! Splitting resolution from execution keeps the read-then-conditionally-
//! write step a single synchronous critical section per photo.

use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    Unique,
    Preferred,
    Duplicate,
}

/// How a duplicate pair is settled: `Replace` keeps only the winner on disk,
/// `Mark` keeps both files with the loser tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    Replace,
    Mark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Embedding distance below which two photos count as duplicates.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_policy")]
    pub policy: DedupPolicy,
}

fn default_threshold() -> f32 {
    0.4
}

fn default_policy() -> DedupPolicy {
    DedupPolicy::Replace
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            policy: default_policy(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub filename: String,
    pub embedding: Embedding,
    pub completeness: f32,
}

#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub filename: String,
    pub distance: f32,
    pub completeness: f32,
}

/// What the store must do with a newly extracted person photo.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No duplicate found (or photo excluded from dedup): persist as unique.
    Unique,
    /// Replace policy, new photo wins: delete the old file, persist the new
    /// photo as unique.
    ReplaceOld { old_filename: String },
    /// Mark policy, new photo wins: rename the old file to `renamed_old`,
    /// persist the new photo as preferred referencing it.
    MarkPreferred {
        old_filename: String,
        renamed_old: String,
    },
    /// Replace policy, cached photo wins: drop the new photo entirely.
    DiscardNew { kept_filename: String },
    /// Mark policy, cached photo wins: persist the new photo tagged as a
    /// duplicate of the cached file.
    MarkDuplicate { kept_filename: String },
}

pub struct DuplicateCache {
    entries: Vec<CacheEntry>,
    threshold: f32,
}

impl DuplicateCache {
    pub fn new(threshold: f32) -> Self {
        Self {
            entries: Vec::new(),
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Linear scan over every cached entry; matches are entries closer than
    /// `threshold`, sorted ascending by distance so callers can pick the
    /// closest first.
    pub fn find_duplicates(&self, embedding: &Embedding, threshold: f32) -> Vec<DuplicateMatch> {
        let mut matches: Vec<DuplicateMatch> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let distance = embedding.distance(&entry.embedding);
                (distance < threshold).then(|| DuplicateMatch {
                    filename: entry.filename.clone(),
                    distance,
                    completeness: entry.completeness,
                })
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches
    }

    pub fn add(&mut self, filename: &str, embedding: Embedding, completeness: f32) {
        self.entries.push(CacheEntry {
            filename: filename.to_string(),
            embedding,
            completeness,
        });
    }

    pub fn remove(&mut self, filename: &str) {
        self.entries.retain(|e| e.filename != filename);
    }

    /// Update the filename on an existing entry without touching its
    /// embedding (used when a stored file is relabeled rather than deleted).
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.filename == old) {
            entry.filename = new.to_string();
        }
    }

    /// Apply the resolution policy for one new person photo against its best
    /// match. Mutates the cache to reflect the outcome; file side effects are
    /// left to the caller. A photo without an embedding is excluded from
    /// deduplication and treated as unconditionally unique.
    pub fn resolve(
        &mut self,
        filename: &str,
        embedding: Option<&Embedding>,
        completeness: f32,
        policy: DedupPolicy,
    ) -> Resolution {
        let Some(embedding) = embedding else {
            return Resolution::Unique;
        };

        let best = self.find_duplicates(embedding, self.threshold).into_iter().next();
        let Some(best) = best else {
            self.add(filename, embedding.clone(), completeness);
            return Resolution::Unique;
        };

        tracing::debug!(
            new = filename,
            cached = %best.filename,
            distance = best.distance,
            new_completeness = completeness,
            cached_completeness = best.completeness,
            "duplicate match"
        );

        if completeness > best.completeness {
            match policy {
                DedupPolicy::Replace => {
                    self.remove(&best.filename);
                    self.add(filename, embedding.clone(), completeness);
                    Resolution::ReplaceOld {
                        old_filename: best.filename,
                    }
                }
                DedupPolicy::Mark => {
                    let renamed = superseded_name(&best.filename);
                    self.rename(&best.filename, &renamed);
                    self.add(filename, embedding.clone(), completeness);
                    Resolution::MarkPreferred {
                        old_filename: best.filename,
                        renamed_old: renamed,
                    }
                }
            }
        } else {
            match policy {
                DedupPolicy::Replace => Resolution::DiscardNew {
                    kept_filename: best.filename,
                },
                DedupPolicy::Mark => Resolution::MarkDuplicate {
                    kept_filename: best.filename,
                },
            }
        }
    }
}

/// Insert the superseded tag before the extension:
/// `scroll_1_photo_0.jpg` → `scroll_1_photo_0-superseded.jpg`.
pub fn superseded_name(filename: &str) -> String {
    tagged_name(filename, "-superseded")
}

/// Tag for mark-mode losers: `scroll_1_photo_0-duplicate.jpg`.
pub fn duplicate_name(filename: &str) -> String {
    tagged_name(filename, "-duplicate")
}

fn tagged_name(filename: &str, tag: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{tag}.{ext}"),
        None => format!("{filename}{tag}"),
    }
}
