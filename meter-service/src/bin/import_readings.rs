use anyhow::{bail, Result};
use meter_client::domain::NewMeterReading;
use meter_service::{
    config::{AppConfig, StoreKind},
    observability,
    pipeline::Pipeline,
    sinks::StoreSink,
    sources::ReadingsCsvFileSource,
    store,
    transform::ReadingValidation,
};
use std::{env, sync::Arc, time::Duration};

const USAGE: &str = "usage: import_readings <csv_path> [--reject-invalid]";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut file_path = None;
    let mut reject_invalid = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--reject-invalid" => reject_invalid = true,
            _ if arg.starts_with("--") => bail!("unknown flag {arg}\n{USAGE}"),
            _ if file_path.is_none() => file_path = Some(arg),
            _ => bail!("{USAGE}"),
        }
    }
    let Some(file_path) = file_path else {
        bail!("{USAGE}");
    };

    // Point METER_SERVICE_CONFIG at the service's config to import into its store.
    let cfg = AppConfig::load()?;
    if cfg.store.kind == StoreKind::Memory {
        bail!("import needs a persistent store; set store.kind = \"postgres\"");
    }

    let store = store::open_store(&cfg.store).await?;

    let pipeline: Pipeline<_, NewMeterReading, _> = Pipeline {
        source: ReadingsCsvFileSource::new(&file_path),
        transforms: vec![Arc::new(ReadingValidation::new(
            store.clone(),
            cfg.validation.clone(),
            reject_invalid,
        ))],
        sink: StoreSink::new(
            store,
            cfg.import.max_retries,
            Duration::from_millis(cfg.import.retry_backoff_ms),
        ),
    };

    let summary = pipeline.run().await?;
    tracing::info!(
        file = %file_path,
        written = summary.written,
        skipped = summary.skipped,
        "import finished"
    );

    Ok(())
}
