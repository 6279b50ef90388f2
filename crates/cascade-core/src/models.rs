use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::id::RecordId;

/// Name of the identifier field every platform record carries.
pub const ID_FIELD: &str = "Id";

/// A single field value as returned by the remote service.
///
/// Text is never reinterpreted as an identifier on decode; code that knows a
/// field is a reference asks for [`FieldValue::to_record_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Id(RecordId),
}

impl FieldValue {
    /// Interpret the value as a reference.
    ///
    /// `Null` and empty text mean "not populated".
    pub fn to_record_id(&self) -> Result<Option<RecordId>, AppError> {
        match self {
            FieldValue::Null => Ok(None),
            FieldValue::Text(s) if s.is_empty() => Ok(None),
            FieldValue::Text(s) => RecordId::parse(s).map(Some),
            FieldValue::Id(id) => Ok(Some(id.clone())),
            other => Err(AppError::InvalidIdentifier(other.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        FieldValue::Id(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// One record: field name → value, in the order the service returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The record's own identifier.
    pub fn id(&self) -> Result<RecordId, AppError> {
        self.reference(ID_FIELD)?.ok_or_else(|| {
            AppError::MalformedRecord(format!("record has no {ID_FIELD} value: {self:?}"))
        })
    }

    /// The identifier held in a reference field, if populated.
    pub fn reference(&self, field: &str) -> Result<Option<RecordId>, AppError> {
        match self.0.get(field) {
            Some(value) => value.to_record_id(),
            None => Ok(None),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Schema entry for one field of an object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub reference_to: Vec<String>,
}

impl FieldDescriptor {
    pub fn is_reference(&self) -> bool {
        !self.reference_to.is_empty()
    }

    /// True when the only valid target of this reference is `sobject`.
    pub fn is_self_lookup(&self, sobject: &str) -> bool {
        self.reference_to.len() == 1 && self.reference_to[0] == sobject
    }
}

/// Field descriptors indexed by field name, in describe order.
pub type FieldMap = IndexMap<String, FieldDescriptor>;

/// The payload of a describe call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeResult {
    pub fields: Vec<FieldDescriptor>,
}

impl DescribeResult {
    pub fn field_map(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.clone()))
            .collect()
    }
}
