//! Batch Orchestrator — drives the résumé pipeline over a collection of
//! inbound messages in fixed-size batches, pacing between batches to stay
//! under the model's rate limit.
//!
//! Nothing here aborts the batch: every per-message failure degrades to a
//! placeholder record so one bad message cannot block the rest.

pub mod attachment;
pub mod extract;
pub mod fields;
pub mod prompts;
pub mod redact;

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::models::message::InboundMessage;
use crate::models::record::{CandidateRecord, EXPERIENCE_UNKNOWN, NA, STATUS_UNTREATED};
use fields::FieldExtractor;

const UNKNOWN: &str = "Inconnu";

// `application_ <job> from <name tokens>.msg`
static JOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"application_ (.*?) from").unwrap());

/// Batch shape and pacing. `batch_size` is the requests-per-window ceiling
/// of the model API; `pause` is the window length.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub pause: Duration,
    /// Attach the original document bytes to each record.
    pub store_cv: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            batch_size: 15,
            pause: Duration::from_secs(60),
            store_cv: false,
        }
    }
}

/// Progress signal consumed by the caller (UI, logs). One `message_done`
/// per message, one `batch_pause` per inter-batch wait.
pub trait ProgressSink: Send {
    fn message_done(&mut self, processed: usize, total: usize);
    fn batch_pause(&mut self, wait: Duration);
}

/// Default sink: progress through structured logs.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn message_done(&mut self, processed: usize, total: usize) {
        info!("{processed}/{total} messages processed");
    }

    fn batch_pause(&mut self, wait: Duration) {
        info!(
            "pausing {}s between batches to respect the model rate limit",
            wait.as_secs()
        );
    }
}

/// Job identifier from the message filename, `Inconnu` when the fixed
/// positional pattern does not match.
pub fn parse_job_name(filename: &str) -> String {
    JOB_RE
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Candidate name tokens: the text after `from` up to the `.msg` suffix,
/// split on whitespace.
pub fn parse_name_tokens(filename: &str) -> Vec<String> {
    match filename.split_once("from") {
        Some((_, rest)) => {
            let name_part = rest.split(".msg").next().unwrap_or(rest);
            name_part.split_whitespace().map(String::from).collect()
        }
        None => vec![UNKNOWN.to_string()],
    }
}

/// Runs the full pipeline over `messages` and returns one record per
/// message, sorted by (job, date) ascending.
///
/// The scratch area used to materialize résumés is purged unconditionally
/// when this function returns, success or failure. Cancellation is checked
/// at every message boundary and every sleep; a cancelled run returns the
/// records completed so far.
pub async fn run(
    messages: &[InboundMessage],
    extractor: &FieldExtractor<'_>,
    settings: &BatchSettings,
    cancel: &CancellationToken,
    progress: &mut dyn ProgressSink,
) -> anyhow::Result<Vec<CandidateRecord>> {
    // Dropped on every exit path, deleting materialized résumés with it.
    let scratch = tempfile::tempdir()?;
    let destination = scratch.path().join("cvs");
    std::fs::create_dir_all(&destination)?;

    let total = messages.len();
    let mut records: Vec<CandidateRecord> = Vec::with_capacity(total);
    let mut processed = 0;

    for (batch_index, batch) in messages.chunks(settings.batch_size.max(1)).enumerate() {
        for message in batch {
            if cancel.is_cancelled() {
                info!("run cancelled after {processed}/{total} messages");
                return Ok(records);
            }

            info!("processing {}", message.filename);
            let record = process_message(
                message,
                extractor,
                scratch.path(),
                &destination,
                settings,
                cancel,
            )
            .await;
            records.push(record);

            processed += 1;
            progress.message_done(processed, total);
        }

        let is_last_batch = (batch_index + 1) * settings.batch_size.max(1) >= total;
        if !is_last_batch {
            progress.batch_pause(settings.pause);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("run cancelled during batch pause");
                    return Ok(records);
                }
                _ = tokio::time::sleep(settings.pause) => {}
            }
        }
    }

    // Bulk re-sort over the completed batch, not a streaming guarantee.
    records.sort_by(|a, b| a.job.cmp(&b.job).then(a.date.cmp(&b.date)));
    Ok(records)
}

async fn process_message(
    message: &InboundMessage,
    extractor: &FieldExtractor<'_>,
    scratch: &std::path::Path,
    destination: &std::path::Path,
    settings: &BatchSettings,
    cancel: &CancellationToken,
) -> CandidateRecord {
    let job = parse_job_name(&message.filename);
    let name_tokens = parse_name_tokens(&message.filename);
    let full_name = name_tokens.join(" ");

    let resume = match attachment::resolve(message, scratch, destination) {
        Ok(resume) => resume,
        Err(e) => {
            error!("skipping {}: {e}", message.filename);
            return placeholder_record(message, job, full_name, None);
        }
    };

    info!("résumé materialized at {}", resume.path.display());
    let cv = settings.store_cv.then(|| resume.bytes.clone());
    let text = extract::extract_text(&resume.bytes, resume.format);

    // Short tokens ("de", initials) would shred unrelated words.
    let maskable: Vec<String> = name_tokens.iter().filter(|t| t.len() > 2).cloned().collect();
    let redaction = redact::redact(&text, &maskable);

    if redaction.text.trim().is_empty() {
        error!(
            "no extractable text in {} (image or unreadable document)",
            message.filename
        );
        return placeholder_record(message, job, full_name, cv);
    }

    let fields = extractor.extract(&redaction.text, cancel).await;

    // A LinkedIn title mentioning freelancing overrides the model's answer.
    let freelance = if title_mentions_freelance(message) {
        "OUI".to_string()
    } else {
        fields.freelance
    };

    CandidateRecord {
        date: message.sent_at,
        job,
        name: full_name,
        linkedin_title: message.linkedin_title.clone(),
        linkedin_address: message.linkedin_address.clone(),
        email: redaction.email.unwrap_or_else(|| NA.to_string()),
        phone: redaction.phone.unwrap_or_else(|| NA.to_string()),
        freelance,
        graduation_year: fields.graduation_year,
        experience_years: fields.experience_years,
        companies: fields.companies,
        skills: fields.skills,
        status: STATUS_UNTREATED,
        cv,
    }
}

fn title_mentions_freelance(message: &InboundMessage) -> bool {
    message.linkedin_title.to_lowercase().contains("freelance")
}

/// Hard-failure row: contact and structured fields pinned to sentinels.
fn placeholder_record(
    message: &InboundMessage,
    job: String,
    name: String,
    cv: Option<Vec<u8>>,
) -> CandidateRecord {
    let freelance = if title_mentions_freelance(message) {
        "OUI".to_string()
    } else {
        NA.to_string()
    };

    CandidateRecord {
        date: message.sent_at,
        job,
        name,
        linkedin_title: message.linkedin_title.clone(),
        linkedin_address: message.linkedin_address.clone(),
        email: NA.to_string(),
        phone: NA.to_string(),
        freelance,
        graduation_year: NA.to_string(),
        experience_years: EXPERIENCE_UNKNOWN,
        companies: NA.to_string(),
        skills: NA.to_string(),
        status: STATUS_UNTREATED,
        cv,
    }
}
