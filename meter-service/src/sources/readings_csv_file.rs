use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use meter_client::domain::{FieldValue, NewMeterReading, ReadingDate, ReadingValues, ValidationStatus};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

const OBJECT_ID: &str = "object_id";
const METER_TYPE_ID: &str = "meter_type_id";
const DATE: &str = "date";
const CONFIDENCE: &str = "confidence";

/// CSV import of historical readings.
///
/// Expected header columns (by name):
/// - object_id
/// - meter_type_id
/// - date (YYYY-MM-DD)
/// - confidence (optional, 0..=1)
///
/// Every other column is a meter field; an empty cell means the value was not
/// recorded. Rows that fail to parse are yielded as errors and the import
/// carries on with the next row.
pub struct ReadingsCsvFileSource {
    path: PathBuf,
}

impl ReadingsCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn parse_optional_f64(column: &str, raw: &str) -> Result<Option<f64>, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|e| PipelineError::Source(format!("invalid number '{trimmed}' in column '{column}': {e}")))
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<NewMeterReading, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let object_id = get(OBJECT_ID)?.to_string();
    let meter_type_id = get(METER_TYPE_ID)?.to_string();
    let date_str = get(DATE)?;
    let date: ReadingDate = date_str
        .parse()
        .map_err(|e| PipelineError::Source(format!("{e}")))?;
    let confidence = match get(CONFIDENCE) {
        Ok(raw) => parse_optional_f64(CONFIDENCE, raw)?,
        Err(_) => None,
    };

    let mut values = ReadingValues::new();
    for (idx, column) in headers.iter().enumerate() {
        if [OBJECT_ID, METER_TYPE_ID, DATE, CONFIDENCE].contains(&column) {
            continue;
        }
        let value = parse_optional_f64(column, record.get(idx).unwrap_or(""))?;
        values.insert(column.to_string(), FieldValue::from(value));
    }

    let reading = NewMeterReading {
        object_id,
        meter_type_id,
        date,
        values,
        validation_status: ValidationStatus::Pending,
        image_url: None,
        confidence,
    };
    reading
        .check()
        .map_err(|e| PipelineError::Source(e.to_string()))?;
    Ok(reading)
}

#[async_trait::async_trait]
impl Source<NewMeterReading> for ReadingsCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<NewMeterReading> {
        // Blocking CSV reads inside one task; import files are small.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open CSV file {}: {e}", path.display())));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let headers = match rdr.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            for (idx, result) in rdr.records().enumerate() {
                let record_no = idx as u64 + 1;
                let parsed = result
                    .map_err(|e| PipelineError::Source(format!("failed to read CSV record {record_no}: {e}")))
                    .and_then(|record| record_to_reading(&record, &headers));

                match parsed {
                    Ok(reading) => yield Ok(Envelope::new(reading, record_no)),
                    Err(e) => {
                        metrics::counter!("readings_csv_parse_errors_total").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}
