use crate::config::{PipelineOptions, SearchParams};
use crate::error::{Result, ScraperError};
use crate::gateway::PlacesGateway;
use crate::record::BusinessRecord;
use crate::storage::RecordSink;
use crate::transform::RecordTransformer;
use crate::types::{PlaceReference, RawPlace};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of one completed `process_location` run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub run_id: Uuid,
    pub total_places: usize,
    /// Records that passed transformation and were handed to a batch
    pub processed_count: usize,
    /// Places whose detail fetch or transformation failed
    pub failed_count: usize,
    /// Entries without a place_id; counted as neither processed nor failed
    pub skipped_count: usize,
    pub batches_saved: usize,
    pub failed_batches: usize,
    /// Records lost because their batch could not be saved
    pub dropped_records: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProcessingSummary {
    fn start(run_id: Uuid, total_places: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            total_places,
            processed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            batches_saved: 0,
            failed_batches: 0,
            dropped_records: 0,
            started_at,
            finished_at: started_at,
        }
    }

    /// Processed records whose batch was accepted by the sink
    pub fn saved_records(&self) -> usize {
        self.processed_count.saturating_sub(self.dropped_records)
    }
}

/// Drives list → (details) → transform → batch → save for one location.
pub struct Pipeline {
    gateway: PlacesGateway,
    sink: Arc<dyn RecordSink>,
    transformer: RecordTransformer,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(gateway: PlacesGateway, sink: Arc<dyn RecordSink>, options: PipelineOptions) -> Self {
        Self {
            gateway,
            sink,
            transformer: RecordTransformer::new(options.source),
            batch_size: options.batch_size.max(1),
        }
    }

    /// Process every place near `search`.
    ///
    /// Only a failed nearby listing is returned as an error, before anything is written.
    /// Detail, validation and save failures are logged and counted in the summary.
    pub async fn process_location(&self, search: &SearchParams) -> Result<ProcessingSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "process_location",
            %run_id,
            latitude = search.latitude,
            longitude = search.longitude,
            source = %self.transformer.schema()
        );
        self.run(search, run_id).instrument(span).await
    }

    async fn run(&self, search: &SearchParams, run_id: Uuid) -> Result<ProcessingSummary> {
        info!(
            "Starting business data processing for location ({}, {}), radius={}, type={}",
            search.latitude, search.longitude, search.radius_meters, search.business_type
        );
        counter!("places_pipeline_runs_total").increment(1);
        let started_at = Utc::now();

        let places = match self.gateway.list_nearby(search).await {
            Ok(places) => places,
            Err(e) => {
                error!("Failed to fetch nearby places: {}. Aborting process for this location.", e);
                counter!("places_pipeline_aborted_total").increment(1);
                return Err(e);
            }
        };

        let total = places.len();
        let mut summary = ProcessingSummary::start(run_id, total, started_at);
        let mut buffer: Vec<BusinessRecord> = Vec::with_capacity(self.batch_size.min(total));

        for (i, raw) in places.iter().enumerate() {
            let reference = PlaceReference::from_raw(raw);
            let Some(place_id) = reference.place_id.as_deref() else {
                warn!("Skipping place without place_id: {}", reference.name);
                summary.skipped_count += 1;
                continue;
            };
            debug!("Processing place {}/{}: {} ({})", i + 1, total, reference.name, place_id);

            match self.build_record(raw, place_id).await {
                Some(record) => {
                    buffer.push(record);
                    summary.processed_count += 1;
                }
                None => summary.failed_count += 1,
            }

            if buffer.len() >= self.batch_size {
                self.flush(&mut buffer, &mut summary).await;
            }
        }

        if !buffer.is_empty() {
            info!("Saving final batch of {} processed businesses", buffer.len());
            self.flush(&mut buffer, &mut summary).await;
        }

        summary.finished_at = Utc::now();
        counter!("places_records_processed_total").increment(summary.processed_count as u64);
        counter!("places_records_failed_total").increment(summary.failed_count as u64);
        counter!("places_batches_failed_total").increment(summary.failed_batches as u64);

        info!(
            "Processing complete for location ({}, {})",
            search.latitude, search.longitude
        );
        info!(
            "Successfully processed and attempted to save: {} businesses ({} saved, {} dropped)",
            summary.processed_count,
            summary.saved_records(),
            summary.dropped_records
        );
        info!(
            "Failed to fetch or process details for: {} places ({} skipped without place_id)",
            summary.failed_count, summary.skipped_count
        );
        Ok(summary)
    }

    /// Detail fetch (when configured) and transformation for one place.
    async fn build_record(&self, raw: &RawPlace, place_id: &str) -> Option<BusinessRecord> {
        let details;
        let payload = if self.transformer.schema().fetches_details() {
            details = self.gateway.get_details(place_id).await?;
            &details
        } else {
            raw
        };

        match self.transformer.transform(payload) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Error transforming place {}: {}", place_id, ScraperError::from(e));
                None
            }
        }
    }

    /// Hand the buffer to the sink and clear it. A failed save drops the batch.
    async fn flush(&self, buffer: &mut Vec<BusinessRecord>, summary: &mut ProcessingSummary) {
        let batch = std::mem::take(buffer);
        debug!("Saving batch of {} processed businesses", batch.len());
        match self.sink.save(&batch).await {
            Ok(()) => summary.batches_saved += 1,
            Err(e) => {
                error!(
                    "Failed to save data batch of {} records to {}: {}. Continuing processing, but data may be lost.",
                    batch.len(),
                    self.sink.describe(),
                    e
                );
                summary.failed_batches += 1;
                summary.dropped_records += batch.len();
            }
        }
    }
}
