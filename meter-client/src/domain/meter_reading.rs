use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

use super::{DomainError, ReadingDate};

/// A stored field value: a number, or explicitly nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Present(f64),
    Absent,
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Present(v) => Some(*v),
            Self::Absent => None,
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Absent, Self::Present)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_number().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<f64>::deserialize(deserializer).map(Self::from)
    }
}

pub type ReadingValues = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Anomaly,
    Invalid,
    #[default]
    Pending,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Anomaly => "anomaly",
            Self::Invalid => "invalid",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Self::Valid),
            "anomaly" => Ok(Self::Anomaly),
            "invalid" => Ok(Self::Invalid),
            "pending" => Ok(Self::Pending),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub id: String,
    pub object_id: String,
    pub meter_type_id: String,
    pub date: ReadingDate,
    pub values: ReadingValues,
    pub validation_status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MeterReading {
    /// Numeric value of `field`, `None` when missing or absent.
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(FieldValue::as_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeterReading {
    pub object_id: String,
    pub meter_type_id: String,
    pub date: ReadingDate,
    pub values: ReadingValues,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl NewMeterReading {
    pub fn check(&self) -> Result<(), DomainError> {
        if self.object_id.trim().is_empty() {
            return Err(DomainError::InvalidInput("objectId is required".to_string()));
        }
        if self.meter_type_id.trim().is_empty() {
            return Err(DomainError::InvalidInput("meterTypeId is required".to_string()));
        }
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(DomainError::InvalidInput(format!(
                    "confidence must be between 0 and 1, got {c}"
                )));
            }
        }
        Ok(())
    }

    pub fn into_reading(self, id: String, created_at: OffsetDateTime) -> MeterReading {
        MeterReading {
            id,
            object_id: self.object_id,
            meter_type_id: self.meter_type_id,
            date: self.date,
            values: self.values,
            validation_status: self.validation_status,
            image_url: self.image_url,
            confidence: self.confidence,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_map_null_to_absent() {
        let values: ReadingValues =
            serde_json::from_str(r#"{"total_kwh": 1852.076, "night": null}"#).unwrap();
        assert_eq!(values["total_kwh"], FieldValue::Present(1852.076));
        assert_eq!(values["night"], FieldValue::Absent);
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"{"night":null,"total_kwh":1852.076}"#
        );
    }

    #[test]
    fn new_reading_defaults_to_pending() {
        let r: NewMeterReading = serde_json::from_str(
            r#"{"objectId":"o1","meterTypeId":"t1","date":"2026-02-01","values":{"total_m3":185}}"#,
        )
        .unwrap();
        assert_eq!(r.validation_status, ValidationStatus::Pending);
        assert!(r.check().is_ok());
    }

    #[test]
    fn confidence_outside_unit_range_is_rejected() {
        let mut r: NewMeterReading = serde_json::from_str(
            r#"{"objectId":"o1","meterTypeId":"t1","date":"2026-02-01","values":{}}"#,
        )
        .unwrap();
        r.confidence = Some(1.2);
        assert!(matches!(r.check(), Err(DomainError::InvalidInput(_))));
        r.confidence = Some(1.0);
        assert!(r.check().is_ok());
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            ValidationStatus::Valid,
            ValidationStatus::Anomaly,
            ValidationStatus::Invalid,
            ValidationStatus::Pending,
        ] {
            assert_eq!(s.as_str().parse::<ValidationStatus>(), Ok(s));
        }
        assert!("ok".parse::<ValidationStatus>().is_err());
    }
}
