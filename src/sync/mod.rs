//! Per-record sync pipeline and batch runner.
//!
//! Each record runs the same pipeline: load photo, detect faces, score,
//! decide, crop if warranted, push the result. Records are independent, so
//! the batch fans out across a worker pool; every failure stays confined to
//! its record and is aggregated as data in the run summary.

pub mod client;

use chrono::Utc;
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::faces::{crop, primary_face, quality, FaceLocator};
use crate::photos::{decode_photo, PhotoStore};
use crate::policy::UpdatePolicy;
use crate::record::{PersonRecord, UpdateCommand};

pub use client::{HttpSyncClient, SyncApi};

/// Typed per-record result. Failure is data here, not control flow: the
/// runner aggregates outcomes instead of unwinding.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Scored and pushed; `photo_cropped` marks whether new photo bytes
    /// were staged and uploaded.
    Synced {
        quality_score: i64,
        photo_cropped: bool,
    },
    /// Below the quality floor; the score was pushed, no crop attempted.
    LowQuality { quality_score: i64 },
    /// Record dropped before an update could be emitted.
    Skipped(PipelineError),
    /// Pipeline ran but the push to the sync API soft-failed.
    SyncFailed(PipelineError),
}

/// End-of-run counts, one increment per record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub updated: usize,
    pub low_quality: usize,
    pub skipped: usize,
    pub sync_failed: usize,
}

impl RunSummary {
    fn tally(&mut self, outcome: &RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Synced {
                photo_cropped: true,
                ..
            } => self.updated += 1,
            RecordOutcome::Synced { .. } => {}
            RecordOutcome::LowQuality { .. } => self.low_quality += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::SyncFailed(_) => self.sync_failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} photos updated, {} low quality, {} skipped, {} sync failures",
            self.processed, self.updated, self.low_quality, self.skipped, self.sync_failed
        )
    }
}

pub struct SyncPipeline<'a> {
    locator: &'a dyn FaceLocator,
    store: &'a dyn PhotoStore,
    api: &'a dyn SyncApi,
    policy: UpdatePolicy,
    config: &'a Config,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        locator: &'a dyn FaceLocator,
        store: &'a dyn PhotoStore,
        api: &'a dyn SyncApi,
        config: &'a Config,
    ) -> Self {
        Self {
            locator,
            store,
            api,
            policy: UpdatePolicy::new(
                config.pipeline.cropping_enabled,
                config.pipeline.update_tolerance_secs,
            ),
            config,
        }
    }

    /// Run the batch across the worker pool and aggregate outcomes.
    pub fn process_batch(&self, records: &[PersonRecord]) -> RunSummary {
        let outcomes: Vec<RecordOutcome> = records
            .par_iter()
            .map(|record| {
                let outcome = self.process_record(record);
                log_outcome(record, &outcome);
                outcome
            })
            .collect();

        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            summary.tally(outcome);
        }
        summary
    }

    fn process_record(&self, record: &PersonRecord) -> RecordOutcome {
        debug!(id = record.id, first_name = %record.first_name, "processing record");

        let image = match self
            .store
            .load_photo(record.id)
            .and_then(|bytes| decode_photo(&bytes))
        {
            Ok(image) => image,
            Err(e) => return RecordOutcome::Skipped(e),
        };

        let faces = match self.locator.detect(&image) {
            Ok(faces) => faces,
            Err(e) => return RecordOutcome::Skipped(e),
        };

        let result = quality::score_photo(&image, &faces);
        let quality_score = result.score.round() as i64;
        let low_quality = result.score < self.config.pipeline.quality_floor;

        // A crop cannot fix a fundamentally unusable photo, so the floor is
        // checked before the update policy.
        let mut photo_bytes = None;
        if !low_quality
            && self
                .policy
                .should_update_photo(&record.last_biometric_update, &record.last_photo_update)
        {
            if let Some(face) = primary_face(&faces) {
                match crop::crop_to_face(
                    &image,
                    face,
                    record.id,
                    self.config.pipeline.crop_margin_ratio,
                    self.config.photos.jpeg_quality,
                    self.store,
                ) {
                    Ok(bytes) => photo_bytes = Some(bytes),
                    Err(e) => {
                        warn!(id = record.id, error = %e, "crop failed, keeping original photo")
                    }
                }
            }
        }

        let photo_cropped = photo_bytes.is_some();
        let command = UpdateCommand {
            id: record.id,
            quality_score,
            updated_at: photo_cropped.then(Utc::now),
            photo_bytes,
        };

        if let Err(e) = self.api.apply(&command) {
            return RecordOutcome::SyncFailed(e);
        }

        if low_quality {
            RecordOutcome::LowQuality { quality_score }
        } else {
            RecordOutcome::Synced {
                quality_score,
                photo_cropped,
            }
        }
    }
}

fn log_outcome(record: &PersonRecord, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Synced {
            quality_score,
            photo_cropped,
        } => info!(
            id = record.id,
            quality_score, photo_cropped, "record synced"
        ),
        RecordOutcome::LowQuality { quality_score } => {
            info!(id = record.id, quality_score, "low quality photo, crop not attempted")
        }
        RecordOutcome::Skipped(e) => warn!(id = record.id, error = %e, "record skipped"),
        RecordOutcome::SyncFailed(e) => warn!(id = record.id, error = %e, "sync push failed"),
    }
}
