//! Storage seams.
//!
//! The validator only needs the two read interfaces, [`SchemaRegistry`] and
//! [`HistoryStore`]. The wider CRUD traits build on them so a single handle
//! (`Arc<dyn Store>`) can serve the HTTP layer and the validator alike.

use async_trait::async_trait;

use crate::domain::{
    MeterObject, MeterReading, MeterType, NewMeterObject, NewMeterReading, NewMeterType,
    ReadingDate,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Upper bound applied to reading listings.
pub const DEFAULT_READINGS_LIMIT: usize = 50;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn find_meter_type_by_id(&self, id: &str) -> Result<Option<MeterType>, StoreError>;
}

/// Prior readings of one (object, meter type) pair.
///
/// Both queries only consider readings dated strictly before `date`, newest
/// first; readings sharing a date are ordered newest `created_at` first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn find_latest_reading_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
    ) -> Result<Option<MeterReading>, StoreError>;

    async fn find_readings_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
        limit: usize,
    ) -> Result<Vec<MeterReading>, StoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Newest first.
    async fn list_objects(&self) -> Result<Vec<MeterObject>, StoreError>;

    async fn create_object(&self, new: NewMeterObject) -> Result<MeterObject, StoreError>;

    async fn update_object(
        &self,
        id: &str,
        update: NewMeterObject,
    ) -> Result<Option<MeterObject>, StoreError>;

    /// Returns `false` when no object had that id.
    async fn delete_object(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MeterTypeStore: SchemaRegistry {
    async fn list_meter_types(&self) -> Result<Vec<MeterType>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the name is taken.
    async fn create_meter_type(&self, new: NewMeterType) -> Result<MeterType, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub object_id: Option<String>,
    pub meter_type_id: Option<String>,
}

#[async_trait]
pub trait ReadingStore: HistoryStore {
    /// Matching readings, newest date first, at most [`DEFAULT_READINGS_LIMIT`].
    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<MeterReading>, StoreError>;

    async fn create_reading(&self, new: NewMeterReading) -> Result<MeterReading, StoreError>;
}

pub trait Store: ObjectStore + MeterTypeStore + ReadingStore {}

impl<T> Store for T where T: ObjectStore + MeterTypeStore + ReadingStore {}
