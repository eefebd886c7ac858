use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::DomainError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Ordered field table of a meter type.
///
/// Iteration follows the declared order; lookups by name return `None` for
/// fields the schema does not define.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema(Vec<MeterField>);

impl FieldSchema {
    pub fn new(fields: Vec<MeterField>) -> Self {
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&MeterField> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MeterField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn check(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for field in &self.0 {
            if field.name.trim().is_empty() {
                return Err(DomainError::InvalidInput("field name is required".to_string()));
            }
            if field.label.trim().is_empty() {
                return Err(DomainError::InvalidInput(format!(
                    "field {:?} needs a label",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(DomainError::InvalidInput(format!(
                    "duplicate field name {:?}",
                    field.name
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FieldSchema {
    type Item = &'a MeterField;
    type IntoIter = std::slice::Iter<'a, MeterField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterType {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub fields: FieldSchema,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMeterType {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub fields: FieldSchema,
}

impl NewMeterType {
    pub fn check(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidInput("Name is required".to_string()));
        }
        if self.unit.trim().is_empty() {
            return Err(DomainError::InvalidInput("Unit is required".to_string()));
        }
        self.fields.check()
    }

    pub fn into_meter_type(self, id: String) -> MeterType {
        MeterType {
            id,
            name: self.name,
            unit: self.unit,
            fields: self.fields,
        }
    }
}
