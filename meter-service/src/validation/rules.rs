use meter_client::domain::{FieldSchema, MeterReading};

use super::{average_delta, CandidateValues, CandidateValue, Finding, Report, ValidationPolicy};

/// Required/numeric checks over every schema field, accumulated.
pub(super) fn check_structure(schema: &FieldSchema, values: &CandidateValues, report: &mut Report) {
    for field in schema {
        match values.get(&field.name) {
            None | Some(CandidateValue::Absent) => {
                if field.required {
                    report.push(Finding::RequiredMissing {
                        field: field.name.clone(),
                        label: field.label.clone(),
                    });
                }
            }
            Some(CandidateValue::NotNumeric(_)) => report.push(Finding::NotNumeric {
                field: field.name.clone(),
                label: field.label.clone(),
            }),
            Some(CandidateValue::Number(_)) => {}
        }
    }
}

/// Monotonicity and delta-spike checks against the previous reading and the
/// recent history window.
pub(super) fn check_history(
    schema: &FieldSchema,
    values: &CandidateValues,
    previous: &MeterReading,
    window: &[MeterReading],
    policy: &ValidationPolicy,
    report: &mut Report,
) {
    for field in schema {
        let Some(new) = values.get(&field.name).and_then(CandidateValue::as_number) else {
            continue;
        };
        let Some(prev) = previous.value(&field.name) else {
            continue;
        };

        // Counters only go up. A regression skips the spike check.
        if new < prev {
            report.push(Finding::Regression {
                field: field.name.clone(),
                label: field.label.clone(),
                new,
                previous: prev,
            });
            continue;
        }

        let Some(average) = average_delta(window, &field.name) else {
            continue;
        };
        let delta = new - prev;
        if average > 0.0 && delta > average * policy.anomaly_multiplier {
            report.push(Finding::DeltaSpike {
                field: field.name.clone(),
                label: field.label.clone(),
                delta,
                average,
                multiplier: policy.anomaly_multiplier,
            });
        }
    }
}
