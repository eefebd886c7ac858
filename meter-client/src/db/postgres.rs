use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use time::{Date, OffsetDateTime};

use super::{
    HistoryStore, MeterTypeStore, ObjectStore, ReadingFilter, ReadingStore, SchemaRegistry,
    StoreError, DEFAULT_READINGS_LIMIT,
};
use crate::domain::{
    new_record_id, FieldSchema, MeterObject, MeterReading, MeterType, NewMeterObject,
    NewMeterReading, NewMeterType, ReadingDate, ReadingValues,
};

/// Postgres-backed store. Tables are created out of band from
/// `sql/schema/01_meter_readings.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(uri: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MeterTypeRow {
    id: String,
    name: String,
    unit: String,
    fields: Json<FieldSchema>,
}

impl From<MeterTypeRow> for MeterType {
    fn from(row: MeterTypeRow) -> Self {
        MeterType {
            id: row.id,
            name: row.name,
            unit: row.unit,
            fields: row.fields.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MeterObjectRow {
    id: String,
    name: String,
    address: String,
    created_at: OffsetDateTime,
}

impl From<MeterObjectRow> for MeterObject {
    fn from(row: MeterObjectRow) -> Self {
        MeterObject {
            id: row.id,
            name: row.name,
            address: row.address,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    id: String,
    object_id: String,
    meter_type_id: String,
    reading_date: Date,
    field_values: Json<ReadingValues>,
    validation_status: String,
    image_url: Option<String>,
    confidence: Option<f64>,
    created_at: OffsetDateTime,
}

impl TryFrom<ReadingRow> for MeterReading {
    type Error = StoreError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let validation_status = row.validation_status.parse().map_err(|e| StoreError::Corrupt {
            id: row.id.clone(),
            reason: format!("{e}"),
        })?;
        Ok(MeterReading {
            id: row.id,
            object_id: row.object_id,
            meter_type_id: row.meter_type_id,
            date: ReadingDate::new(row.reading_date),
            values: row.field_values.0,
            validation_status,
            image_url: row.image_url,
            confidence: row.confidence,
            created_at: row.created_at,
        })
    }
}

fn into_readings(rows: Vec<ReadingRow>) -> Result<Vec<MeterReading>, StoreError> {
    rows.into_iter().map(MeterReading::try_from).collect()
}

const READING_COLUMNS: &str = r#"
    id,
    object_id,
    meter_type_id,
    reading_date,
    field_values,
    validation_status,
    image_url,
    confidence,
    created_at
"#;

#[async_trait]
impl SchemaRegistry for PgStore {
    async fn find_meter_type_by_id(&self, id: &str) -> Result<Option<MeterType>, StoreError> {
        let row = sqlx::query_as::<_, MeterTypeRow>(
            "SELECT id, name, unit, fields FROM meter_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MeterType::from))
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn find_latest_reading_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
    ) -> Result<Option<MeterReading>, StoreError> {
        Ok(self
            .find_readings_before(object_id, meter_type_id, date, 1)
            .await?
            .into_iter()
            .next())
    }

    async fn find_readings_before(
        &self,
        object_id: &str,
        meter_type_id: &str,
        date: ReadingDate,
        limit: usize,
    ) -> Result<Vec<MeterReading>, StoreError> {
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM meter_readings
            WHERE object_id = $1
              AND meter_type_id = $2
              AND reading_date < $3
            ORDER BY reading_date DESC, created_at DESC
            LIMIT $4
            "#
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(object_id)
            .bind(meter_type_id)
            .bind(date.date())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        into_readings(rows)
    }
}

#[async_trait]
impl ObjectStore for PgStore {
    async fn list_objects(&self) -> Result<Vec<MeterObject>, StoreError> {
        let rows = sqlx::query_as::<_, MeterObjectRow>(
            "SELECT id, name, address, created_at FROM meter_objects ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MeterObject::from).collect())
    }

    async fn create_object(&self, new: NewMeterObject) -> Result<MeterObject, StoreError> {
        let row = sqlx::query_as::<_, MeterObjectRow>(
            r#"
            INSERT INTO meter_objects (id, name, address, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING id, name, address, created_at
            "#,
        )
        .bind(new_record_id())
        .bind(&new.name)
        .bind(&new.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_object(
        &self,
        id: &str,
        update: NewMeterObject,
    ) -> Result<Option<MeterObject>, StoreError> {
        let row = sqlx::query_as::<_, MeterObjectRow>(
            r#"
            UPDATE meter_objects
            SET name = $2, address = $3
            WHERE id = $1
            RETURNING id, name, address, created_at
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MeterObject::from))
    }

    async fn delete_object(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM meter_objects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MeterTypeStore for PgStore {
    async fn list_meter_types(&self) -> Result<Vec<MeterType>, StoreError> {
        let rows = sqlx::query_as::<_, MeterTypeRow>(
            "SELECT id, name, unit, fields FROM meter_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MeterType::from).collect())
    }

    async fn create_meter_type(&self, new: NewMeterType) -> Result<MeterType, StoreError> {
        let meter_type = new.into_meter_type(new_record_id());
        let res = sqlx::query(
            "INSERT INTO meter_types (id, name, unit, fields) VALUES ($1, $2, $3, $4)",
        )
        .bind(&meter_type.id)
        .bind(&meter_type.name)
        .bind(&meter_type.unit)
        .bind(Json(&meter_type.fields))
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(meter_type),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Conflict(
                format!("meter type {:?} already exists", meter_type.name),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn list_readings(&self, filter: &ReadingFilter) -> Result<Vec<MeterReading>, StoreError> {
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM meter_readings
            WHERE ($1::TEXT IS NULL OR object_id = $1)
              AND ($2::TEXT IS NULL OR meter_type_id = $2)
            ORDER BY reading_date DESC, created_at DESC
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(filter.object_id.as_deref())
            .bind(filter.meter_type_id.as_deref())
            .bind(DEFAULT_READINGS_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;

        into_readings(rows)
    }

    async fn create_reading(&self, new: NewMeterReading) -> Result<MeterReading, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO meter_readings (
                id, object_id, meter_type_id, reading_date, field_values,
                validation_status, image_url, confidence, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            RETURNING {READING_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(new_record_id())
            .bind(&new.object_id)
            .bind(&new.meter_type_id)
            .bind(new.date.date())
            .bind(Json(&new.values))
            .bind(new.validation_status.as_str())
            .bind(&new.image_url)
            .bind(new.confidence)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(
            reading_id = %row.id,
            object_id = %row.object_id,
            status = %row.validation_status,
            "meter reading stored"
        );

        row.try_into()
    }
}
