use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::models::{FieldValue, Record};

/// Transforms outgoing records before they reach an output sink.
pub trait RecordMapper: Send + Sync {
    /// Output column name for a field.
    fn transform_key(&self, name: &str) -> String;

    /// Output value for a field, keyed by the field's original name.
    fn transform_value(&self, name: &str, value: &FieldValue) -> FieldValue;

    /// Apply both transforms to every entry, returning a new record.
    fn transform_record(&self, record: &Record) -> Record {
        record
            .iter()
            .map(|(name, value)| (self.transform_key(name), self.transform_value(name, value)))
            .collect()
    }
}

/// A single value transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTransform {
    Strip,
    Lowercase,
    Uppercase,
    /// Rewrite a 15-character id as its 18-character form.
    Id18,
}

impl ValueTransform {
    pub fn apply(self, value: FieldValue) -> FieldValue {
        let FieldValue::Text(text) = value else {
            return value;
        };
        match self {
            ValueTransform::Strip => FieldValue::Text(text.trim().to_string()),
            ValueTransform::Lowercase => FieldValue::Text(text.to_lowercase()),
            ValueTransform::Uppercase => FieldValue::Text(text.to_uppercase()),
            ValueTransform::Id18 => match RecordId::parse(&text) {
                Ok(id) => FieldValue::Id(id),
                Err(_) => FieldValue::Text(text),
            },
        }
    }
}

/// Table-driven mapper: column renames plus per-field transform chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapper {
    #[serde(default)]
    pub field_name_mapping: HashMap<String, String>,
    #[serde(default)]
    pub value_transforms: HashMap<String, Vec<ValueTransform>>,
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.field_name_mapping.insert(from.into(), to.into());
        self
    }

    pub fn transform(mut self, field: impl Into<String>, transform: ValueTransform) -> Self {
        self.value_transforms
            .entry(field.into())
            .or_default()
            .push(transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.field_name_mapping.is_empty() && self.value_transforms.is_empty()
    }
}

impl RecordMapper for FieldMapper {
    fn transform_key(&self, name: &str) -> String {
        self.field_name_mapping
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn transform_value(&self, name: &str, value: &FieldValue) -> FieldValue {
        match self.value_transforms.get(name) {
            Some(chain) => chain
                .iter()
                .fold(value.clone(), |value, transform| transform.apply(value)),
            None => value.clone(),
        }
    }
}
