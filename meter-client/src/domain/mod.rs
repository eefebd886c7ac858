mod date;
mod ids;
mod meter_object;
mod meter_reading;
mod meter_type;

pub use date::ReadingDate;
pub use ids::new_record_id;
pub use meter_object::{MeterObject, NewMeterObject};
pub use meter_reading::{FieldValue, MeterReading, NewMeterReading, ReadingValues, ValidationStatus};
pub use meter_type::{FieldKind, FieldSchema, MeterField, MeterType, NewMeterType};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("date must be YYYY-MM-DD, got {0:?}")]
    InvalidDate(String),
    #[error("unknown validation status {0:?}")]
    UnknownStatus(String),
    #[error("{0}")]
    InvalidInput(String),
}
