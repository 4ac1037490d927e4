//! Session state and persistence: directories, accepted photos, metadata,
//! and the duplicate cache, owned for the lifetime of one profile scan.

use std::path::{Path, PathBuf};

use crate::dedup::{
    duplicate_name, DedupPolicy, DuplicateCache, DuplicateStatus, Resolution,
};
use crate::embedding::Embedder;
use crate::errors::{ScrollCullError, ScrollCullResult};
use crate::perception::extractor::{ScoredPhoto, Subfolder};
use crate::session::types::{PhotoMetadata, ScrollCycleResult};

pub struct SessionContext {
    pub session_id: String,
    pub root: PathBuf,
    pub photos_dir: PathBuf,
    pub cache: DuplicateCache,
    pub metadata: Vec<PhotoMetadata>,
    pub cycles: Vec<ScrollCycleResult>,
}

impl SessionContext {
    /// Create the session directory tree under `base_dir` (falling back to
    /// the user documents directory, then the working directory).
    pub fn create(base_dir: Option<PathBuf>, dedup_threshold: f32) -> ScrollCullResult<Self> {
        let base = base_dir
            .or_else(dirs::document_dir)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let session_id = format!(
            "session_{}",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let root = base.join("scrollcull_sessions").join(&session_id);
        let photos_dir = root.join("photos");
        for sub in [Subfolder::Person, Subfolder::MultiPerson, Subfolder::Other] {
            std::fs::create_dir_all(photos_dir.join(sub.dir_name()))?;
        }
        tracing::info!(session = %session_id, path = %root.display(), "session created");

        Ok(Self {
            session_id,
            root,
            photos_dir,
            cache: DuplicateCache::new(dedup_threshold),
            metadata: Vec::new(),
            cycles: Vec::new(),
        })
    }

    pub fn person_dir(&self) -> PathBuf {
        self.photos_dir.join(Subfolder::Person.dir_name())
    }

    fn photo_path(&self, subfolder: Subfolder, filename: &str) -> PathBuf {
        self.photos_dir.join(subfolder.dir_name()).join(filename)
    }

    /// Concatenated OCR text across all completed cycles.
    pub fn ocr_text(&self) -> String {
        self.cycles
            .iter()
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Run one extracted photo through duplicate resolution and persistence.
    ///
    /// Only single-person photos consult the cache; multi-person and
    /// person-less photos are always persisted as unique. A persistence
    /// failure drops the photo's metadata and cache entry but never aborts.
    pub fn commit_photo(
        &mut self,
        photo: &ScoredPhoto,
        scroll_index: u32,
        photo_index: usize,
        policy: DedupPolicy,
        embedder: &dyn Embedder,
    ) -> ScrollCullResult<()> {
        let filename = format!("scroll_{scroll_index}_photo_{photo_index}.jpg");

        let embedding = if photo.is_single_person {
            match embedder.embed(&photo.image) {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!(error = %e, file = %filename, "embedding failed — photo excluded from dedup");
                    None
                }
            }
        } else {
            None
        };

        let resolution = if photo.is_single_person {
            self.cache
                .resolve(&filename, embedding.as_ref(), photo.completeness, policy)
        } else {
            Resolution::Unique
        };

        match resolution {
            Resolution::Unique => {
                self.persist(photo, filename, scroll_index, DuplicateStatus::Unique, None);
            }
            Resolution::ReplaceOld { old_filename } => {
                let old_path = self.photo_path(Subfolder::Person, &old_filename);
                if let Err(e) = std::fs::remove_file(&old_path) {
                    tracing::warn!(error = %e, path = %old_path.display(), "failed to delete superseded photo");
                }
                self.metadata.retain(|m| m.filename != old_filename);
                tracing::info!(old = %old_filename, new = %filename, "replaced less-complete duplicate");
                self.persist(photo, filename, scroll_index, DuplicateStatus::Unique, None);
            }
            Resolution::MarkPreferred {
                old_filename,
                renamed_old,
            } => {
                let from = self.photo_path(Subfolder::Person, &old_filename);
                let to = self.photo_path(Subfolder::Person, &renamed_old);
                if let Err(e) = std::fs::rename(&from, &to) {
                    tracing::warn!(error = %e, from = %from.display(), "failed to rename superseded photo");
                }
                // The superseded record changes name, so every record linked
                // to it must follow or the link dangles.
                for record in self.metadata.iter_mut() {
                    if record.filename == old_filename {
                        record.filename = renamed_old.clone();
                    } else if record.duplicate_of.as_deref() == Some(old_filename.as_str()) {
                        record.duplicate_of = Some(renamed_old.clone());
                    }
                }
                tracing::info!(old = %renamed_old, new = %filename, "marked preferred over superseded");
                self.persist(
                    photo,
                    filename,
                    scroll_index,
                    DuplicateStatus::Preferred,
                    Some(renamed_old),
                );
            }
            Resolution::DiscardNew { kept_filename } => {
                tracing::debug!(kept = %kept_filename, discarded = %filename, "duplicate discarded");
            }
            Resolution::MarkDuplicate { kept_filename } => {
                let tagged = duplicate_name(&filename);
                tracing::debug!(kept = %kept_filename, duplicate = %tagged, "duplicate kept, tagged");
                self.persist(
                    photo,
                    tagged,
                    scroll_index,
                    DuplicateStatus::Duplicate,
                    Some(kept_filename),
                );
            }
        }
        Ok(())
    }

    fn persist(
        &mut self,
        photo: &ScoredPhoto,
        filename: String,
        scroll_index: u32,
        status: DuplicateStatus,
        duplicate_of: Option<String>,
    ) {
        let path = self.photo_path(photo.subfolder, &filename);
        if let Err(e) = save_jpeg(&photo.image, &path) {
            tracing::warn!(error = %e, path = %path.display(), "photo write failed — dropping its metadata");
            // Keep the cache honest: no file, no entry.
            self.cache.remove(&filename);
            return;
        }

        self.metadata.push(PhotoMetadata {
            filename,
            bbox: photo.bbox,
            scroll_index,
            extracted_at: chrono::Utc::now(),
            person_detection: photo.person_detection.clone(),
            is_single_person: photo.is_single_person,
            primary_person_box: photo.primary_person_box,
            subfolder: photo.subfolder,
            duplicate_status: status,
            completeness_score: photo.completeness,
            duplicate_of,
        });
    }

    /// Remove every persisted photo (and its metadata) captured during a
    /// similar cycle — near-certain re-captures of content already seen.
    pub fn cleanup_similar_cycles(&mut self, similar_cycles: &[u32]) -> usize {
        if similar_cycles.is_empty() {
            return 0;
        }
        let (drop, mut keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.metadata)
            .into_iter()
            .partition(|m| similar_cycles.contains(&m.scroll_index));

        for record in &drop {
            let path = self.photo_path(record.subfolder, &record.filename);
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(error = %e, path = %path.display(), "cleanup delete failed");
            }
            self.cache.remove(&record.filename);
        }

        // Surviving records may link to a file that was just removed; clear
        // those links so every remaining duplicate_of still resolves.
        for record in keep.iter_mut() {
            if let Some(target) = record.duplicate_of.as_deref() {
                if drop.iter().any(|d| d.filename == target) {
                    tracing::debug!(file = %record.filename, link = target, "cleared link to removed photo");
                    record.duplicate_of = None;
                }
            }
        }
        let removed = drop.len();
        self.metadata = keep;
        tracing::info!(removed, cycles = ?similar_cycles, "similar-cycle cleanup done");
        removed
    }

    /// Write `metadata.json` and `cycles.json` into the session root.
    pub fn finish(&self) -> ScrollCullResult<()> {
        let metadata_path = self.root.join("metadata.json");
        std::fs::write(&metadata_path, serde_json::to_string_pretty(&self.metadata)?)
            .map_err(|e| ScrollCullError::Persistence(format!("metadata.json: {e}")))?;

        let cycles_path = self.root.join("cycles.json");
        std::fs::write(&cycles_path, serde_json::to_string_pretty(&self.cycles)?)
            .map_err(|e| ScrollCullError::Persistence(format!("cycles.json: {e}")))?;

        tracing::info!(
            photos = self.metadata.len(),
            cycles = self.cycles.len(),
            path = %self.root.display(),
            "session flushed"
        );
        Ok(())
    }
}

fn save_jpeg(image: &image::DynamicImage, path: &Path) -> ScrollCullResult<()> {
    // JPEG has no alpha; captures arrive as RGBA.
    let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());
    rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
    Ok(())
}
