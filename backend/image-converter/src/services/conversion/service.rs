//! Conversion service - drives one storage event from start to finish
//!
//! The workflow for each event:
//! 1. Check the destination bucket is configured
//! 2. Decode the envelope into a notification
//! 3. Download and decode the source WebP
//! 4. Encode as JPEG and upload under the derived key
//!
//! Any failure aborts the remaining steps and is returned as-is. Nothing is
//! retried and nothing needs compensating, since only the final step
//! persists anything.

use super::codec::ImageCodec;
use super::deadline::{within_deadline, Stage};
use super::fetcher::ObjectFetcher;
use super::naming::derive_destination_key;
use super::publisher::ObjectPublisher;
use crate::config::ConversionConfig;
use crate::error::{ConvertError, Result};
use crate::events::{decode_notification, Envelope};
use crate::models::ConversionReport;
use crate::services::storage::ObjectStore;
use image::GenericImageView;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Progress of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Decoded,
    Fetched,
    Published,
    Done,
}

/// Per-event conversion pipeline, shared across invocations
#[derive(Clone)]
pub struct ConversionService {
    fetcher: ObjectFetcher,
    publisher: ObjectPublisher,
    config: ConversionConfig,
}

impl ConversionService {
    pub fn new(store: Arc<dyn ObjectStore>, config: ConversionConfig) -> Self {
        let codec = ImageCodec::default();
        Self {
            fetcher: ObjectFetcher::new(store.clone(), codec),
            publisher: ObjectPublisher::new(store, codec),
            config,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Handle one inbound event
    pub async fn handle(&self, envelope: &Envelope) -> Result<ConversionReport> {
        let mut state = PipelineState::Start;
        let result = self.run(envelope, &mut state).await;

        match &result {
            Ok(report) => info!(
                event_id = %report.event_id,
                source = %format!("{}/{}", report.source_bucket, report.source_key),
                destination = %format!("{}/{}", report.destination_bucket, report.destination_key),
                width = report.width,
                height = report.height,
                bytes = report.bytes_written,
                "Conversion completed"
            ),
            Err(e) => error!(
                failed_after = ?state,
                kind = e.kind(),
                error = %e,
                "Conversion failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        envelope: &Envelope,
        state: &mut PipelineState,
    ) -> Result<ConversionReport> {
        let deadline = Instant::now() + self.config.deadline;

        // Fail before any network call if there is nowhere to write
        let destination_bucket = self
            .config
            .destination_bucket
            .as_deref()
            .ok_or(ConvertError::ConfigMissing("DESTINATION_BUCKET"))?;

        let notification = decode_notification(envelope)?;
        advance(state, PipelineState::Decoded);

        let destination_key = derive_destination_key(&notification.key);

        let image = within_deadline(
            Stage::Fetching,
            deadline,
            self.config.deadline,
            self.fetcher.fetch(&notification.bucket, &notification.key),
        )
        .await?;
        advance(state, PipelineState::Fetched);

        let (width, height) = image.dimensions();
        let bytes_written = within_deadline(
            Stage::Publishing,
            deadline,
            self.config.deadline,
            self.publisher
                .publish(destination_bucket, &destination_key, Arc::new(image)),
        )
        .await?;
        advance(state, PipelineState::Published);

        let report = ConversionReport {
            event_id: notification.event_id,
            source_bucket: notification.bucket,
            source_key: notification.key,
            destination_bucket: destination_bucket.to_string(),
            destination_key,
            width,
            height,
            bytes_written,
        };
        advance(state, PipelineState::Done);

        Ok(report)
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?state, to = ?next, "Pipeline state transition");
    *state = next;
}
