use std::cmp::Ordering;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{
    HistoryStore, MeterTypeStore, ObjectStore, ReadingFilter, ReadingStore, SchemaRegistry,
    StoreError, DEFAULT_READINGS_LIMIT,
};
use crate::domain::{
    new_record_id, MeterObject, MeterReading, MeterType, NewMeterObject, NewMeterReading,
    NewMeterType, ReadingDate,
};

/// Process-local store used for tests and for running the service without a
/// database. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    objects: Vec<MeterObject>,
    meter_types: Vec<MeterType>,
    readings: Vec<MeterReading>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_reading_first(a: &&MeterReading, b: &&MeterReading) -> Ordering {
    b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at))
}

impl Tables {
    // Walk insertion order backwards so the stable sort leaves later inserts
    // first among exact ties.
    fn history(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
    ) -> Vec<&MeterReading> {
        let mut rows: Vec<&MeterReading> = self
            .readings
            .iter()
            .rev()
            .filter(|r| r.object_id == object_id && r.meter_type_id == meter_type_id && r.date < date)
            .collect();
        rows.sort_by(newest_reading_first);
        rows
    }
}

#[async_trait]
impl SchemaRegistry for InMemoryStore {
    async fn find_meter_type_by_id(&self, id: &str) -> Result<Option<MeterType>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.meter_types.iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn find_latest_reading_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
    ) -> Result<Option<MeterReading>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history(object_id, meter_type_id, date)
            .first()
            .map(|r| (*r).clone()))
    }

    async fn find_readings_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
        limit: usize,
    ) -> Result<Vec<MeterReading>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history(object_id, meter_type_id, date)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_objects(&self) -> Result<Vec<MeterObject>, StoreError> {
        let tables = self.tables.read().await;
        let mut objects: Vec<MeterObject> = tables.objects.iter().rev().cloned().collect();
        objects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(objects)
    }

    async fn create_object(&self, new: NewMeterObject) -> Result<MeterObject, StoreError> {
        let object = MeterObject {
            id: new_record_id(),
            name: new.name,
            address: new.address,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.write().await.objects.push(object.clone());
        Ok(object)
    }

    async fn update_object(
        &self,
        id: &str,
        update: NewMeterObject,
    ) -> Result<Option<MeterObject>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.objects.iter_mut().find(|o| o.id == id).map(|o| {
            o.name = update.name;
            o.address = update.address;
            o.clone()
        }))
    }

    async fn delete_object(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.objects.len();
        tables.objects.retain(|o| o.id != id);
        Ok(tables.objects.len() != before)
    }
}

#[async_trait]
impl MeterTypeStore for InMemoryStore {
    async fn list_meter_types(&self) -> Result<Vec<MeterType>, StoreError> {
        Ok(self.tables.read().await.meter_types.clone())
    }

    async fn create_meter_type(&self, new: NewMeterType) -> Result<MeterType, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.meter_types.iter().any(|t| t.name == new.name) {
            return Err(StoreError::Conflict(format!(
                "meter type {:?} already exists",
                new.name
            )));
        }
        let meter_type = new.into_meter_type(new_record_id());
        tables.meter_types.push(meter_type.clone());
        Ok(meter_type)
    }
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<MeterReading>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&MeterReading> = tables
            .readings
            .iter()
            .rev()
            .filter(|r| filter.object_id.as_deref().map_or(true, |id| r.object_id == id))
            .filter(|r| filter.meter_type_id.as_deref().map_or(true, |id| r.meter_type_id == id))
            .collect();
        rows.sort_by(newest_reading_first);
        Ok(rows.into_iter().take(DEFAULT_READINGS_LIMIT).cloned().collect())
    }

    async fn create_reading(&self, new: NewMeterReading) -> Result<MeterReading, StoreError> {
        let reading = new.into_reading(new_record_id(), OffsetDateTime::now_utc());
        self.tables.write().await.readings.push(reading.clone());
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, ReadingValues, ValidationStatus};

    fn reading(object_id: &str, date: &str, kwh: f64) -> NewMeterReading {
        let mut values = ReadingValues::new();
        values.insert("total_kwh".to_string(), FieldValue::Present(kwh));
        NewMeterReading {
            object_id: object_id.to_string(),
            meter_type_id: "t1".to_string(),
            date: date.parse().unwrap(),
            values,
            validation_status: ValidationStatus::Valid,
            image_url: None,
            confidence: None,
        }
    }

    #[tokio::test]
    async fn history_is_strictly_before_and_newest_first() {
        let store = InMemoryStore::new();
        for (date, kwh) in [("2026-01-01", 10.0), ("2026-03-01", 30.0), ("2026-02-01", 20.0)] {
            store.create_reading(reading("o1", date, kwh)).await.unwrap();
        }
        store.create_reading(reading("o2", "2026-02-15", 99.0)).await.unwrap();

        let cutoff: ReadingDate = "2026-03-01".parse().unwrap();
        let latest = store
            .find_latest_reading_before("o1", "t1", cutoff)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.value("total_kwh"), Some(20.0));

        let window = store.find_readings_before("o1", "t1", cutoff, 6).await.unwrap();
        let kwh: Vec<Option<f64>> = window.iter().map(|r| r.value("total_kwh")).collect();
        assert_eq!(kwh, [Some(20.0), Some(10.0)]);

        let limited = store.find_readings_before("o1", "t1", cutoff, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn same_day_readings_prefer_the_latest_insert() {
        let store = InMemoryStore::new();
        store.create_reading(reading("o1", "2026-02-01", 100.0)).await.unwrap();
        store.create_reading(reading("o1", "2026-02-01", 120.0)).await.unwrap();

        let latest = store
            .find_latest_reading_before("o1", "t1", "2026-03-01".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.value("total_kwh"), Some(120.0));
    }

    #[tokio::test]
    async fn duplicate_meter_type_names_conflict() {
        let store = InMemoryStore::new();
        let new = NewMeterType {
            name: "Cold water".to_string(),
            unit: "m3".to_string(),
            fields: Default::default(),
        };
        store.create_meter_type(new.clone()).await.unwrap();
        let err = store.create_meter_type(new).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_meter_types().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn objects_update_and_delete_report_missing_ids() {
        let store = InMemoryStore::new();
        let created = store
            .create_object(NewMeterObject {
                name: "Kiosk".to_string(),
                address: "Trudovaya 22".to_string(),
            })
            .await
            .unwrap();

        let renamed = store
            .update_object(
                &created.id,
                NewMeterObject {
                    name: "Kiosk 2".to_string(),
                    address: "Trudovaya 22".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Kiosk 2");
        assert_eq!(renamed.created_at, created.created_at);

        let missing = NewMeterObject {
            name: "x".to_string(),
            address: "y".to_string(),
        };
        assert!(store.update_object("nope", missing).await.unwrap().is_none());
        assert!(store.delete_object(&created.id).await.unwrap());
        assert!(!store.delete_object(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn listing_filters_and_orders_readings() {
        let store = InMemoryStore::new();
        store.create_reading(reading("o1", "2026-01-01", 1.0)).await.unwrap();
        store.create_reading(reading("o2", "2026-02-01", 2.0)).await.unwrap();
        store.create_reading(reading("o1", "2026-03-01", 3.0)).await.unwrap();

        let all = store.list_readings(&ReadingFilter::default()).await.unwrap();
        let dates: Vec<String> = all.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2026-03-01", "2026-02-01", "2026-01-01"]);

        let filter = ReadingFilter {
            object_id: Some("o1".to_string()),
            meter_type_id: None,
        };
        assert_eq!(store.list_readings(&filter).await.unwrap().len(), 2);
    }
}
