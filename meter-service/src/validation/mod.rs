//! Reading validation engine.
//!
//! Decides whether a submitted set of meter values is plausible given the
//! meter type's schema and the readings that came before it. The checks run
//! in a fixed order:
//!
//! 1. resolve the meter type (unknown type is an `invalid` verdict);
//! 2. structural checks on every schema field, accumulated;
//! 3. stop if anything structural failed;
//! 4. no earlier reading: baseline, done;
//! 5. per field: monotonicity against the previous reading, then the delta
//!    spike check against the average of the recent history window.
//!
//! The engine only reads from its collaborators and keeps no state between
//! calls.

use std::collections::BTreeMap;

use meter_client::{
    db::{HistoryStore, SchemaRegistry, StoreError},
    domain::{FieldValue, NewMeterReading, ReadingDate, ValidationStatus},
};
use serde::{Deserialize, Deserializer, Serialize};

mod finding;
mod history;
mod rules;

pub use finding::Finding;
pub use history::average_delta;

/// Severity of a verdict, ordered `Valid < Anomaly < Invalid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Valid,
    Anomaly,
    Invalid,
}

impl Verdict {
    /// The more severe of the two.
    pub fn merge(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Anomaly => "anomaly",
            Self::Invalid => "invalid",
        }
    }
}

impl From<Verdict> for ValidationStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Valid => ValidationStatus::Valid,
            Verdict::Anomaly => ValidationStatus::Anomaly,
            Verdict::Invalid => ValidationStatus::Invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// How many prior readings feed the delta average.
    pub history_window: usize,
    pub anomaly_multiplier: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            history_window: 6,
            anomaly_multiplier: 3.0,
        }
    }
}

/// A submitted value before validation. Anything that is neither a number nor
/// null is kept so the structural check can report it.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateValue {
    Number(f64),
    Absent,
    NotNumeric(serde_json::Value),
}

impl CandidateValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Absent | Self::NotNumeric(_) => None,
        }
    }
}

impl From<FieldValue> for CandidateValue {
    fn from(v: FieldValue) -> Self {
        match v {
            FieldValue::Present(n) => Self::Number(n),
            FieldValue::Absent => Self::Absent,
        }
    }
}

impl<'de> Deserialize<'de> for CandidateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Self::Absent,
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) => Self::Number(v),
                None => Self::NotNumeric(serde_json::Value::Number(n)),
            },
            other => Self::NotNumeric(other),
        })
    }
}

pub type CandidateValues = BTreeMap<String, CandidateValue>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReading {
    pub object_id: String,
    pub meter_type_id: String,
    pub date: ReadingDate,
    #[serde(default)]
    pub values: CandidateValues,
}

impl From<&NewMeterReading> for CandidateReading {
    fn from(r: &NewMeterReading) -> Self {
        Self {
            object_id: r.object_id.clone(),
            meter_type_id: r.meter_type_id.clone(),
            date: r.date,
            values: r
                .values
                .iter()
                .map(|(k, v)| (k.clone(), CandidateValue::from(*v)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub status: Verdict,
    pub details: Vec<String>,
    pub findings: Vec<Finding>,
}

/// Accumulates findings; the status is the merge of their severities.
#[derive(Debug, Default)]
pub(crate) struct Report {
    status: Verdict,
    findings: Vec<Finding>,
}

impl Report {
    pub(crate) fn push(&mut self, finding: Finding) {
        self.status = self.status.merge(finding.severity());
        self.findings.push(finding);
    }

    fn status(&self) -> Verdict {
        self.status
    }

    fn finish(mut self) -> ValidationResult {
        if self.findings.is_empty() {
            self.push(Finding::AllPassed);
        }
        ValidationResult {
            status: self.status,
            details: self.findings.iter().map(Finding::message).collect(),
            findings: self.findings,
        }
    }
}

/// Validate `candidate` against its meter type and the readings before it.
///
/// Verdicts, including "meter type not found", come back as `Ok`; only a
/// failing collaborator produces `Err`.
pub async fn validate_reading<R, H>(
    registry: &R,
    history: &H,
    policy: &ValidationPolicy,
    candidate: &CandidateReading,
) -> Result<ValidationResult, StoreError>
where
    R: SchemaRegistry + ?Sized,
    H: HistoryStore + ?Sized,
{
    let result = evaluate(registry, history, policy, candidate).await?;

    metrics::counter!("reading_validations_total", "status" => result.status.as_str()).increment(1);
    tracing::debug!(
        object_id = %candidate.object_id,
        meter_type_id = %candidate.meter_type_id,
        date = %candidate.date,
        status = result.status.as_str(),
        findings = result.findings.len(),
        "reading validated"
    );

    Ok(result)
}

async fn evaluate<R, H>(
    registry: &R,
    history: &H,
    policy: &ValidationPolicy,
    candidate: &CandidateReading,
) -> Result<ValidationResult, StoreError>
where
    R: SchemaRegistry + ?Sized,
    H: HistoryStore + ?Sized,
{
    let mut report = Report::default();

    let Some(meter_type) = registry.find_meter_type_by_id(&candidate.meter_type_id).await? else {
        report.push(Finding::MeterTypeNotFound);
        return Ok(report.finish());
    };

    rules::check_structure(&meter_type.fields, &candidate.values, &mut report);
    if report.status() == Verdict::Invalid {
        return Ok(report.finish());
    }

    let Some(previous) = history
        .find_latest_reading_before(&candidate.object_id, &candidate.meter_type_id, candidate.date)
        .await?
    else {
        report.push(Finding::Baseline);
        return Ok(report.finish());
    };

    let window = history
        .find_readings_before(
            &candidate.object_id,
            &candidate.meter_type_id,
            candidate.date,
            policy.history_window,
        )
        .await?;

    rules::check_history(
        &meter_type.fields,
        &candidate.values,
        &previous,
        &window,
        policy,
        &mut report,
    );

    Ok(report.finish())
}
