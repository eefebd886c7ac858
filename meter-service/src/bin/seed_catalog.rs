use anyhow::{bail, Context, Result};
use meter_service::{
    config::{AppConfig, StoreKind},
    observability,
    seed::{apply_catalog, Catalog},
    store,
};
use std::{env, fs};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        bail!("usage: seed_catalog <catalog.toml>");
    }
    let path = &args[1];

    let contents = fs::read_to_string(path).with_context(|| format!("failed to read catalog {path}"))?;
    let catalog = Catalog::from_toml(&contents)?;

    let cfg = AppConfig::load()?;
    if cfg.store.kind == StoreKind::Memory {
        bail!("seeding needs a persistent store; set store.kind = \"postgres\"");
    }
    let store = store::open_store(&cfg.store).await?;

    let summary = apply_catalog(&*store, catalog).await?;
    tracing::info!(
        objects_created = summary.objects_created,
        objects_existing = summary.objects_existing,
        meter_types_created = summary.meter_types_created,
        meter_types_existing = summary.meter_types_existing,
        "seed finished"
    );

    Ok(())
}
