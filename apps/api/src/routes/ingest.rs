//! POST /api/v1/applications/ingest
//!
//! Accepts a multipart upload of `.msg` files, runs the full pipeline
//! (attachment resolution, text extraction, redaction, structured-field
//! extraction) and persists the resulting records.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::mail;
use crate::models::message::InboundMessage;
use crate::models::record::CandidateRecord;
use crate::pipeline::{self, fields::FieldExtractor, TracingProgress};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    /// Attach the original document bytes to each stored record.
    #[serde(default)]
    pub store_cv: bool,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub processed: usize,
    pub inserted: usize,
    pub skipped_duplicates: usize,
    pub records: Vec<CandidateRecord>,
}

pub async fn handle_ingest(
    State(state): State<AppState>,
    Query(query): Query<IngestQuery>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let mut messages: Vec<InboundMessage> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !filename.to_ascii_lowercase().ends_with(".msg") {
            warn!("ignoring non-.msg upload '{filename}'");
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload '{filename}': {e}")))?;

        let mail = mail::parse_msg(&data).map_err(|e| {
            AppError::UnprocessableEntity(format!("'{filename}' is not a valid .msg file: {e}"))
        })?;
        let (linkedin_title, linkedin_address) = mail::extract_linkedin_info(&mail.body);

        messages.push(InboundMessage {
            filename,
            sent_at: mail.sent_at,
            linkedin_title,
            linkedin_address,
            attachments: mail.attachments,
        });
    }

    if messages.is_empty() {
        return Err(AppError::Validation(
            "no .msg files found in the upload".to_string(),
        ));
    }

    info!("ingesting {} message(s)", messages.len());

    let extractor = FieldExtractor::new(&state.llm, state.config.retry_policy());
    let settings = state.config.batch_settings(query.store_cv);
    let cancel = CancellationToken::new();
    let mut progress = TracingProgress;

    let records = pipeline::run(&messages, &extractor, &settings, &cancel, &mut progress).await?;

    let mut inserted = 0;
    let mut skipped_duplicates = 0;
    for record in &records {
        if state.store.insert_one(record).await? {
            inserted += 1;
        } else {
            skipped_duplicates += 1;
        }
    }

    Ok(Json(IngestResponse {
        processed: records.len(),
        inserted,
        skipped_duplicates,
        records,
    }))
}
