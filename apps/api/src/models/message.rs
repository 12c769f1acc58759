use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Document formats accepted as résumé attachments.
/// Resolved once at ingestion and carried through as a typed value — never
/// re-derived from the filename at later stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Docx,
}

impl ResumeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(ResumeFormat::Pdf),
            "docx" => Some(ResumeFormat::Docx),
            _ => None,
        }
    }
}

/// A named binary blob attached to an inbound message.
#[derive(Debug, Clone)]
pub struct AttachmentCandidate {
    /// `None` when the mail container carries an attachment without a
    /// filename property — the "unnamed attachment" failure case.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// One email-derived unit of work. Immutable once received; the job
/// identifier and candidate name tokens are derived from `filename` by the
/// orchestrator (`application_ <job> from <name tokens>.msg` convention).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub filename: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub linkedin_title: String,
    pub linkedin_address: String,
    pub attachments: Vec<AttachmentCandidate>,
}

/// A résumé materialized into the run's scratch area, with its format tag
/// and byte content. Owned by the pipeline run that produced it; the file
/// disappears with the scratch directory at the end of the run.
#[derive(Debug)]
pub struct ResolvedResume {
    pub path: PathBuf,
    pub format: ResumeFormat,
    pub bytes: Vec<u8>,
}
