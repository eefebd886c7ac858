use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::DomainError;

/// A premise whose meters are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterObject {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMeterObject {
    pub name: String,
    pub address: String,
}

impl NewMeterObject {
    pub fn check(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidInput("Name is required".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(DomainError::InvalidInput("Address is required".to_string()));
        }
        Ok(())
    }
}
