use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use meter_client::{
    db::{Store, StoreError},
    domain::{MeterReading, NewMeterReading},
};

use crate::pipeline::{Envelope, ImportSummary, PipelineError, Sink};

/// Persists readings one at a time, in stream order.
///
/// No batching: each reading has to be stored before the next one is
/// validated, otherwise it would be missing from that reading's history.
pub struct StoreSink {
    store: Arc<dyn Store>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl StoreSink {
    pub fn new(store: Arc<dyn Store>, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            store,
            max_retries,
            retry_backoff,
        }
    }

    async fn write(&self, env: &Envelope<NewMeterReading>) -> Result<MeterReading, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            match self.store.create_reading(env.payload.clone()).await {
                Ok(reading) => {
                    metrics::counter!("readings_imported_total").increment(1);
                    if let Ok(dur) = std::time::SystemTime::now().duration_since(env.received_at) {
                        metrics::histogram!("reading_import_latency_seconds").record(dur.as_secs_f64());
                    }
                    return Ok(reading);
                }
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        record = env.record,
                        "reading write failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, record = env.record, "reading write failed, giving up");
                    metrics::counter!("reading_import_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

fn is_transient(e: &StoreError) -> bool {
    matches!(e, StoreError::Database(_))
}

#[async_trait::async_trait]
impl Sink<NewMeterReading> for StoreSink {
    async fn run<S>(&self, mut input: S) -> Result<ImportSummary, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<NewMeterReading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut summary = ImportSummary::default();

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "skipping record");
                    summary.skipped += 1;
                    continue;
                }
            };

            let reading = self.write(&env).await?;
            tracing::debug!(
                record = env.record,
                reading_id = %reading.id,
                status = %reading.validation_status,
                "reading imported"
            );
            summary.written += 1;
        }

        Ok(summary)
    }
}
