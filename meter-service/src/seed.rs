//! One-off bootstrap of objects and meter types from a TOML catalog.
//!
//! Re-running a catalog is harmless: objects are matched by name and meter
//! types by their unique name, and existing entries are left alone.

use meter_client::{
    db::{MeterTypeStore, ObjectStore, Store, StoreError},
    domain::{NewMeterObject, NewMeterType},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub objects: Vec<NewMeterObject>,
    pub meter_types: Vec<NewMeterType>,
}

impl Catalog {
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let catalog: Catalog = toml::from_str(contents)?;
        for object in &catalog.objects {
            object
                .check()
                .map_err(|e| anyhow::anyhow!("object {:?}: {e}", object.name))?;
        }
        for meter_type in &catalog.meter_types {
            meter_type
                .check()
                .map_err(|e| anyhow::anyhow!("meter type {:?}: {e}", meter_type.name))?;
        }
        Ok(catalog)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub objects_created: usize,
    pub objects_existing: usize,
    pub meter_types_created: usize,
    pub meter_types_existing: usize,
}

pub async fn apply_catalog(store: &dyn Store, catalog: Catalog) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();

    let objects = store.list_objects().await?;
    for new in catalog.objects {
        if let Some(existing) = objects.iter().find(|o| o.name == new.name) {
            tracing::info!(object_id = %existing.id, name = %existing.name, "object already present");
            summary.objects_existing += 1;
            continue;
        }
        let object = store.create_object(new).await?;
        tracing::info!(object_id = %object.id, name = %object.name, "object created");
        summary.objects_created += 1;
    }

    let meter_types = store.list_meter_types().await?;
    for new in catalog.meter_types {
        if let Some(existing) = meter_types.iter().find(|t| t.name == new.name) {
            tracing::info!(meter_type_id = %existing.id, name = %existing.name, "meter type already present");
            summary.meter_types_existing += 1;
            continue;
        }
        let name = new.name.clone();
        match store.create_meter_type(new).await {
            Ok(meter_type) => {
                tracing::info!(meter_type_id = %meter_type.id, name = %meter_type.name, "meter type created");
                summary.meter_types_created += 1;
            }
            Err(StoreError::Conflict(_)) => {
                tracing::info!(%name, "meter type created concurrently, skipping");
                summary.meter_types_existing += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}
