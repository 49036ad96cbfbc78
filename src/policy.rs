use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

/// Named, overridable policy constants for the engine.
///
/// Every tunable the pipeline consults lives here so that nothing is decided
/// by a literal buried in business logic. The defaults are the documented
/// product policy; embedders override individual fields through a partial
/// JSON document (`#[serde(default)]` fills the rest).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnginePolicy {
    /// Extraction confidence below this floor forces `approval_required`
    /// on the bill regardless of amount or vendor settings.
    pub low_confidence_threshold: f64,

    /// Fallback due date when the document states none: issue date plus
    /// this many days.
    pub default_due_days: i64,

    /// Approval threshold applied when a vendor requires approval but has
    /// not configured one of its own.
    pub default_approval_threshold: Decimal,

    /// Days an approval step may sit awaiting a decision before it is
    /// escalated to the workflow's fallback approver.
    pub escalation_after_days: i64,

    /// Failed processor attempts tolerated for one bill/method pair before
    /// the bill is marked disputed for human intervention.
    pub max_payment_retries: u32,

    /// Upper bound on a single extraction provider call, in seconds.
    pub extraction_timeout_secs: u64,

    /// Upper bound on a single payment processor call, in seconds.
    pub processor_timeout_secs: u64,

    /// Name-similarity floor below which vendor candidates are ignored.
    pub name_match_threshold: f64,

    /// Currency assumed when a document does not state one.
    pub default_currency: String,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.5,
            default_due_days: 30,
            default_approval_threshold: dec!(1000),
            escalation_after_days: 3,
            max_payment_retries: 3,
            extraction_timeout_secs: 30,
            processor_timeout_secs: 15,
            name_match_threshold: 0.85,
            default_currency: "USD".to_string(),
        }
    }
}

impl EnginePolicy {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_secs(self.processor_timeout_secs)
    }
}
