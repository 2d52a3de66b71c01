// src/ingest/providers/structured_api.rs
//! Structured API sources are registered and scheduled but yield nothing yet.

use crate::error::CollectError;
use crate::ingest::types::{RawRecord, Source};

pub async fn collect(source: &Source) -> Result<Vec<RawRecord>, CollectError> {
    tracing::debug!(
        target: "ingest",
        source = %source.id,
        endpoint = %source.endpoint,
        "structured-api collector has no extractor; returning no records"
    );
    Ok(Vec::new())
}
