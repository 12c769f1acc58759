//! Structured-Field Extractor — prompts the generative model with redacted
//! résumé text and normalizes its JSON reply into `StructuredFields`.
//!
//! The external call is wrapped in an explicit retry state machine. Quota
//! exhaustion is the only retryable condition; every other failure degrades
//! the single item to placeholder values instead of aborting the batch.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::llm_client::{GenerativeModel, LlmError};
use crate::models::record::{StructuredFields, EXPERIENCE_UNKNOWN, NA};
use crate::pipeline::prompts::EXTRACTION_PROMPT;

/// Backoff parameters for quota-exhaustion retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_wait: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base_wait, 2*base_wait, 4*base_wait, ...
    pub fn wait_for(&self, attempt: u32) -> Duration {
        self.base_wait * 2u32.saturating_pow(attempt)
    }
}

/// The retry machine around one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState {
    Attempting(u32),
    Waiting { next_attempt: u32, wait: Duration },
    Done(StructuredFields),
}

/// Transition taken when attempt `attempt` hits quota exhaustion: wait with
/// doubled backoff, unless this was the final allowed attempt.
pub fn on_quota_exhausted(policy: &RetryPolicy, attempt: u32) -> RetryState {
    let next_attempt = attempt + 1;
    if next_attempt >= policy.max_retries {
        RetryState::Done(StructuredFields::placeholder())
    } else {
        RetryState::Waiting {
            next_attempt,
            wait: policy.wait_for(attempt),
        }
    }
}

/// Extracts structured fields from redacted résumé text via the injected
/// generative-text capability.
pub struct FieldExtractor<'a> {
    model: &'a dyn GenerativeModel,
    policy: RetryPolicy,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(model: &'a dyn GenerativeModel, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    /// Never fails: the worst outcome is an all-placeholder record.
    pub async fn extract(
        &self,
        redacted_text: &str,
        cancel: &CancellationToken,
    ) -> StructuredFields {
        let prompt = EXTRACTION_PROMPT.replace("{text}", redacted_text);

        let mut state = RetryState::Attempting(0);
        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    match self.model.generate_json(&prompt).await {
                        Ok(value) => RetryState::Done(normalize_fields(&value)),
                        Err(LlmError::QuotaExceeded) => {
                            warn!(
                                "quota exhausted, attempt {}/{}",
                                attempt + 1,
                                self.policy.max_retries
                            );
                            on_quota_exhausted(&self.policy, attempt)
                        }
                        // Fatal for this item only: degrade, do not retry.
                        Err(e) => {
                            warn!("model call failed, using placeholder fields: {e}");
                            RetryState::Done(StructuredFields::placeholder())
                        }
                    }
                }
                RetryState::Waiting { next_attempt, wait } => {
                    warn!("waiting {}s before retrying model call", wait.as_secs());
                    tokio::select! {
                        _ = cancel.cancelled() => return StructuredFields::placeholder(),
                        _ = tokio::time::sleep(wait) => {}
                    }
                    RetryState::Attempting(next_attempt)
                }
                RetryState::Done(fields) => return fields,
            };
        }
    }
}

/// Fills every missing or malformed key with its sentinel so a partially
/// shaped object never leaves this boundary.
pub fn normalize_fields(value: &Value) -> StructuredFields {
    StructuredFields {
        freelance: string_field(value, "Freelance"),
        graduation_year: string_field(value, "Année de diplomation"),
        experience_years: experience_field(value.get("Expérience")),
        companies: string_field(value, "Entreprises"),
        skills: string_field(value, "Compétences"),
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| NA.to_string())
}

/// The model answers in French and may write "2,5" for 2.5 years.
fn experience_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(EXPERIENCE_UNKNOWN),
        Some(Value::String(s)) => s
            .trim()
            .replace(',', ".")
            .parse()
            .unwrap_or(EXPERIENCE_UNKNOWN),
        _ => EXPERIENCE_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;

    /// Scripted model: raises quota exhaustion `quota_failures` times, then
    /// returns `reply`.
    struct ScriptedModel {
        quota_failures: u32,
        calls: AtomicU32,
        reply: Result<Value, &'static str>,
    }

    impl ScriptedModel {
        fn quota_then(reply: Value, quota_failures: u32) -> Self {
            Self {
                quota_failures,
                calls: AtomicU32::new(0),
                reply: Ok(reply),
            }
        }

        fn always_quota() -> Self {
            Self {
                quota_failures: u32::MAX,
                calls: AtomicU32::new(0),
                reply: Err("unreachable"),
            }
        }

        fn fatal(message: &'static str) -> Self {
            Self {
                quota_failures: 0,
                calls: AtomicU32::new(0),
                reply: Err(message),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate_json(&self, _prompt: &str) -> Result<Value, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.quota_failures {
                return Err(LlmError::QuotaExceeded);
            }
            match &self.reply {
                Ok(value) => Ok(value.clone()),
                Err(message) => Err(LlmError::Api {
                    status: 500,
                    message: message.to_string(),
                }),
            }
        }
    }

    fn full_reply() -> Value {
        json!({
            "Freelance": "NON",
            "Année de diplomation": "2021",
            "Expérience": "3",
            "Entreprises": "Acme, Globex",
            "Compétences": "Python, SQL, Spark, Airflow, dbt"
        })
    }

    fn policy(max_retries: u32, base_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_wait: Duration::from_secs(base_secs),
        }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let p = policy(5, 30);
        assert_eq!(p.wait_for(0), Duration::from_secs(30));
        assert_eq!(p.wait_for(1), Duration::from_secs(60));
        assert_eq!(p.wait_for(2), Duration::from_secs(120));
    }

    #[test]
    fn test_quota_transition_waits_then_advances() {
        let p = policy(5, 30);
        assert_eq!(
            on_quota_exhausted(&p, 0),
            RetryState::Waiting {
                next_attempt: 1,
                wait: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn test_quota_transition_gives_up_on_final_attempt() {
        let p = policy(3, 30);
        assert_eq!(
            on_quota_exhausted(&p, 2),
            RetryState::Done(StructuredFields::placeholder())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_quota_failures_then_success() {
        let model = ScriptedModel::quota_then(full_reply(), 2);
        let extractor = FieldExtractor::new(&model, policy(5, 30));
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let fields = extractor.extract("CV text", &cancel).await;
        // Two backoff waits of increasing duration: 30s then 60s.
        assert_eq!(started.elapsed(), Duration::from_secs(90));
        assert_eq!(fields.graduation_year, "2021");
        assert_eq!(fields.experience_years, 3.0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_degrade_to_placeholder() {
        let model = ScriptedModel::always_quota();
        let extractor = FieldExtractor::new(&model, policy(3, 30));
        let cancel = CancellationToken::new();

        let fields = extractor.extract("CV text", &cancel).await;
        assert_eq!(fields, StructuredFields::placeholder());
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_degrades_immediately_without_retry() {
        let model = ScriptedModel::fatal("boom");
        let extractor = FieldExtractor::new(&model, policy(5, 30));
        let cancel = CancellationToken::new();

        let fields = extractor.extract("CV text", &cancel).await;
        assert_eq!(fields, StructuredFields::placeholder());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff_wait() {
        let model = ScriptedModel::always_quota();
        let extractor = FieldExtractor::new(&model, policy(5, 30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let fields = extractor.extract("CV text", &cancel).await;
        assert_eq!(fields, StructuredFields::placeholder());
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_missing_keys_filled_with_defaults() {
        let fields = normalize_fields(&json!({ "Freelance": "OUI" }));
        assert_eq!(fields.freelance, "OUI");
        assert_eq!(fields.graduation_year, NA);
        assert_eq!(fields.experience_years, EXPERIENCE_UNKNOWN);
        assert_eq!(fields.companies, NA);
        assert_eq!(fields.skills, NA);
    }

    #[test]
    fn test_experience_accepts_french_decimal_comma() {
        let fields = normalize_fields(&json!({ "Expérience": "2,5" }));
        assert_eq!(fields.experience_years, 2.5);
    }

    #[test]
    fn test_experience_accepts_json_number() {
        let fields = normalize_fields(&json!({ "Expérience": 4 }));
        assert_eq!(fields.experience_years, 4.0);
    }

    #[test]
    fn test_experience_garbage_becomes_sentinel() {
        let fields = normalize_fields(&json!({ "Expérience": "beaucoup" }));
        assert_eq!(fields.experience_years, EXPERIENCE_UNKNOWN);
    }

    #[test]
    fn test_non_object_reply_becomes_all_placeholders() {
        let fields = normalize_fields(&json!(["not", "an", "object"]));
        assert_eq!(fields, StructuredFields::placeholder());
    }
}
