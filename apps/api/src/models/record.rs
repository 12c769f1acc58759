use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for unresolved string fields.
pub const NA: &str = "N/A";

/// Sentinel for an unknown/unparseable years-of-experience figure.
pub const EXPERIENCE_UNKNOWN: f64 = -1.0;

/// Workflow status code for a freshly ingested application.
pub const STATUS_UNTREATED: i32 = 0;

/// Normalized model output for one résumé.
///
/// Every field carries a safe placeholder when the model response is absent
/// or malformed; this struct never leaves the extractor partially shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredFields {
    /// `OUI`, `NON`, or `N/A`.
    pub freelance: String,
    /// Four-digit year of the most recent credential, or `N/A`.
    pub graduation_year: String,
    /// Cumulative professional experience in years, internships excluded.
    /// `-1.0` when unknown.
    pub experience_years: f64,
    /// Comma-joined employer names, or `N/A`.
    pub companies: String,
    /// Comma-joined key technical skills (five expected), or `N/A`.
    pub skills: String,
}

impl StructuredFields {
    /// The all-sentinel record used whenever the model call degrades.
    pub fn placeholder() -> Self {
        StructuredFields {
            freelance: NA.to_string(),
            graduation_year: NA.to_string(),
            experience_years: EXPERIENCE_UNKNOWN,
            companies: NA.to_string(),
            skills: NA.to_string(),
        }
    }
}

/// Final aggregate row, one per inbound message.
///
/// Serde names mirror the review grid's column names; the raw CV bytes are
/// stored but never serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "Date")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "Job")]
    pub job: String,
    #[serde(rename = "Nom")]
    pub name: String,
    #[serde(rename = "Titre LinkedIn")]
    pub linkedin_title: String,
    #[serde(rename = "Adresse")]
    pub linkedin_address: String,
    #[serde(rename = "Mail")]
    pub email: String,
    #[serde(rename = "Téléphone")]
    pub phone: String,
    #[serde(rename = "Freelance")]
    pub freelance: String,
    #[serde(rename = "Diplôme")]
    pub graduation_year: String,
    #[serde(rename = "Expérience")]
    pub experience_years: f64,
    #[serde(rename = "Entreprises")]
    pub companies: String,
    #[serde(rename = "Compétences Tech")]
    pub skills: String,
    #[serde(rename = "Statut")]
    pub status: i32,
    #[serde(skip)]
    pub cv: Option<Vec<u8>>,
}
