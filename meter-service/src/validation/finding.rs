use serde::{Serialize, Serializer};

use super::Verdict;

/// One observation made while validating a reading.
///
/// `message()` renders the human-readable detail line; serialization emits a
/// structured record so consumers can match findings to fields by name
/// instead of searching the rendered text.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    MeterTypeNotFound,
    RequiredMissing {
        field: String,
        label: String,
    },
    NotNumeric {
        field: String,
        label: String,
    },
    Baseline,
    Regression {
        field: String,
        label: String,
        new: f64,
        previous: f64,
    },
    DeltaSpike {
        field: String,
        label: String,
        delta: f64,
        average: f64,
        multiplier: f64,
    },
    AllPassed,
}

impl Finding {
    pub fn severity(&self) -> Verdict {
        match self {
            Self::MeterTypeNotFound
            | Self::RequiredMissing { .. }
            | Self::NotNumeric { .. }
            | Self::Regression { .. } => Verdict::Invalid,
            Self::DeltaSpike { .. } => Verdict::Anomaly,
            Self::Baseline | Self::AllPassed => Verdict::Valid,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MeterTypeNotFound => "meter_type_not_found",
            Self::RequiredMissing { .. } => "required_missing",
            Self::NotNumeric { .. } => "not_numeric",
            Self::Baseline => "baseline",
            Self::Regression { .. } => "regression",
            Self::DeltaSpike { .. } => "delta_spike",
            Self::AllPassed => "all_passed",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::RequiredMissing { field, .. }
            | Self::NotNumeric { field, .. }
            | Self::Regression { field, .. }
            | Self::DeltaSpike { field, .. } => Some(field),
            Self::MeterTypeNotFound | Self::Baseline | Self::AllPassed => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MeterTypeNotFound => "Meter type not found".to_string(),
            Self::RequiredMissing { label, .. } => format!("Required field \"{label}\" is missing"),
            Self::NotNumeric { label, .. } => format!("Field \"{label}\" must be a number"),
            Self::Baseline => "First reading for this meter — baseline established".to_string(),
            Self::Regression {
                label,
                new,
                previous,
                ..
            } => format!("Field \"{label}\": new value {new} is less than previous {previous}"),
            Self::DeltaSpike {
                label,
                delta,
                average,
                multiplier,
                ..
            } => format!(
                "Field \"{label}\": delta {} exceeds {multiplier}× average {}",
                cents(*delta),
                cents(*average)
            ),
            Self::AllPassed => "All checks passed".to_string(),
        }
    }
}

/// Two decimals, halves rounded away from zero. `{:.2}` alone rounds
/// exact halves to even.
fn cents(v: f64) -> String {
    format!("{:.2}", (v * 100.0).round() / 100.0)
}

#[derive(Serialize)]
struct FindingRecord<'a> {
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    severity: Verdict,
    message: String,
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FindingRecord {
            code: self.code(),
            field: self.field(),
            severity: self.severity(),
            message: self.message(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_renders_values_without_trailing_zeros() {
        let f = Finding::Regression {
            field: "total_kwh".to_string(),
            label: "Total kWh".to_string(),
            new: 120.0,
            previous: 150.0,
        };
        assert_eq!(
            f.message(),
            "Field \"Total kWh\": new value 120 is less than previous 150"
        );
        assert_eq!(f.severity(), Verdict::Invalid);
    }

    #[test]
    fn spike_renders_two_decimals_and_multiplier() {
        let f = Finding::DeltaSpike {
            field: "total_m3".to_string(),
            label: "Total m3".to_string(),
            delta: 200.0,
            average: 50.0,
            multiplier: 3.0,
        };
        assert_eq!(
            f.message(),
            "Field \"Total m3\": delta 200.00 exceeds 3× average 50.00"
        );
    }

    #[test]
    fn spike_rounds_half_cents_up() {
        let f = Finding::DeltaSpike {
            field: "k".to_string(),
            label: "K".to_string(),
            delta: 3.125,
            average: 0.625,
            multiplier: 3.0,
        };
        assert_eq!(f.message(), "Field \"K\": delta 3.13 exceeds 3× average 0.63");
    }

    #[test]
    fn serializes_as_structured_record() {
        let f = Finding::RequiredMissing {
            field: "total_kwh".to_string(),
            label: "Total kWh".to_string(),
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["code"], "required_missing");
        assert_eq!(json["field"], "total_kwh");
        assert_eq!(json["severity"], "invalid");
        assert_eq!(json["message"], "Required field \"Total kWh\" is missing");

        let json = serde_json::to_value(Finding::Baseline).unwrap();
        assert!(json.get("field").is_none());
        assert_eq!(json["severity"], "valid");
    }
}
