use std::sync::Arc;

use meter_client::{db::Store, domain::NewMeterReading};

use crate::{
    pipeline::{Envelope, PipelineError, Transform},
    validation::{validate_reading, CandidateReading, ValidationPolicy, Verdict},
};

/// Runs the validation engine on each imported reading against the live store
/// and stamps the verdict onto it.
///
/// With `reject_invalid`, invalid readings are turned into pipeline errors and
/// never reach the sink; otherwise they are kept with status `invalid`.
#[derive(Clone)]
pub struct ReadingValidation {
    store: Arc<dyn Store>,
    policy: ValidationPolicy,
    reject_invalid: bool,
}

impl ReadingValidation {
    pub fn new(store: Arc<dyn Store>, policy: ValidationPolicy, reject_invalid: bool) -> Self {
        Self {
            store,
            policy,
            reject_invalid,
        }
    }
}

#[async_trait::async_trait]
impl Transform<NewMeterReading, NewMeterReading> for ReadingValidation {
    async fn apply(
        &self,
        mut input: Envelope<NewMeterReading>,
    ) -> Result<Envelope<NewMeterReading>, PipelineError> {
        let candidate = CandidateReading::from(&input.payload);
        let result = validate_reading(&*self.store, &*self.store, &self.policy, &candidate)
            .await
            .map_err(|e| PipelineError::Transform(format!("record {}: {e}", input.record)))?;

        if result.status == Verdict::Invalid && self.reject_invalid {
            metrics::counter!("reading_import_rejected_total").increment(1);
            return Err(PipelineError::Rejected {
                record: input.record,
                reason: result.details.join("; "),
            });
        }

        if result.status != Verdict::Valid {
            tracing::warn!(
                record = input.record,
                object_id = %candidate.object_id,
                date = %candidate.date,
                status = result.status.as_str(),
                details = ?result.details,
                "imported reading flagged"
            );
        }

        input.payload.validation_status = result.status.into();
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::{
        db::{InMemoryStore, MeterTypeStore},
        domain::{
            FieldKind, FieldSchema, FieldValue, MeterField, NewMeterType, ReadingValues,
            ValidationStatus,
        },
    };

    async fn store_with_water() -> (Arc<InMemoryStore>, String) {
        let store = Arc::new(InMemoryStore::new());
        let mt = store
            .create_meter_type(NewMeterType {
                name: "Cold water".to_string(),
                unit: "m3".to_string(),
                fields: FieldSchema::new(vec![MeterField {
                    name: "total_m3".to_string(),
                    label: "Total m3".to_string(),
                    kind: FieldKind::Number,
                    required: true,
                    unit: None,
                }]),
            })
            .await
            .unwrap();
        (store, mt.id)
    }

    fn envelope(meter_type_id: &str, value: Option<f64>) -> Envelope<NewMeterReading> {
        let mut values = ReadingValues::new();
        values.insert("total_m3".to_string(), FieldValue::from(value));
        Envelope::new(
            NewMeterReading {
                object_id: "o1".to_string(),
                meter_type_id: meter_type_id.to_string(),
                date: "2026-02-01".parse().unwrap(),
                values,
                validation_status: ValidationStatus::Pending,
                image_url: None,
                confidence: None,
            },
            7,
        )
    }

    #[tokio::test]
    async fn stamps_the_verdict() {
        let (store, mt_id) = store_with_water().await;
        let t = ReadingValidation::new(store, ValidationPolicy::default(), false);

        let out = t.apply(envelope(&mt_id, Some(185.0))).await.unwrap();
        assert_eq!(out.payload.validation_status, ValidationStatus::Valid);

        let out = t.apply(envelope(&mt_id, None)).await.unwrap();
        assert_eq!(out.payload.validation_status, ValidationStatus::Invalid);
    }

    #[tokio::test]
    async fn rejects_invalid_when_asked() {
        let (store, mt_id) = store_with_water().await;
        let t = ReadingValidation::new(store, ValidationPolicy::default(), true);

        let err = t.apply(envelope(&mt_id, None)).await.unwrap_err();
        match err {
            PipelineError::Rejected { record, reason } => {
                assert_eq!(record, 7);
                assert_eq!(reason, "Required field \"Total m3\" is missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
