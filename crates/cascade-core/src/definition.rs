use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::id::RecordId;
use crate::mapper::FieldMapper;
use crate::models::ID_FIELD;
use crate::step::ExtractionScope;

/// The only definition format version understood.
pub const DEFINITION_VERSION: u32 = 1;

/// An extraction run loaded from a JSON definition file.
///
/// ```json
/// {
///   "version": 1,
///   "operation": [
///     { "sobject": "Account", "fields": ["Name", "ParentId"], "extract": { "all": true } },
///     { "sobject": "Contact", "fields": ["LastName", "AccountId"],
///       "extract": { "query": "MailingCountry = 'Caprica'" }, "file": "contacts.csv" }
///   ]
/// }
/// ```
///
/// Steps run in the order listed; list referenced types first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub version: u32,
    pub operation: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub sobject: String,
    pub fields: Vec<String>,
    pub extract: ScopeDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<FieldMapper>,
}

/// Exactly one of `all`, `query`, `ids`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeDefinition {
    #[serde(default)]
    pub all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<RecordId>>,
}

impl OperationDefinition {
    /// Read, parse and validate a definition file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read definition file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            AppError::ConfigError(msg) => {
                AppError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let mut definition: OperationDefinition = serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid definition JSON: {e}")))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check the definition and normalize field lists so each starts with `Id`.
    pub fn validate(&mut self) -> Result<(), AppError> {
        if self.version != DEFINITION_VERSION {
            return Err(AppError::ConfigError(format!(
                "Unsupported definition version {} (expected {DEFINITION_VERSION})",
                self.version
            )));
        }
        if self.operation.is_empty() {
            return Err(AppError::ConfigError(
                "Definition contains no extraction steps".into(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &mut self.operation {
            if step.sobject.trim().is_empty() {
                return Err(AppError::ConfigError("Step has an empty sobject".into()));
            }
            if !seen.insert(step.sobject.clone()) {
                return Err(AppError::ConfigError(format!(
                    "{} appears more than once",
                    step.sobject
                )));
            }
            if step.fields.iter().any(|f| f.trim().is_empty()) {
                return Err(AppError::ConfigError(format!(
                    "{} lists an empty field name",
                    step.sobject
                )));
            }
            step.scope()?;
            if let Some(mapping) = &step.mapping
                && mapping
                    .field_name_mapping
                    .get(ID_FIELD)
                    .is_some_and(|to| to != ID_FIELD)
            {
                return Err(AppError::ConfigError(format!(
                    "{}: the {ID_FIELD} field cannot be renamed",
                    step.sobject
                )));
            }

            step.fields.retain(|f| f != ID_FIELD);
            step.fields.insert(0, ID_FIELD.to_string());
        }
        Ok(())
    }

    /// Object types in step order.
    pub fn sobjects(&self) -> Vec<&str> {
        self.operation.iter().map(|s| s.sobject.as_str()).collect()
    }
}

impl StepDefinition {
    pub fn scope(&self) -> Result<ExtractionScope, AppError> {
        let ScopeDefinition { all, query, ids } = &self.extract;
        match (all, query, ids) {
            (true, None, None) => Ok(ExtractionScope::AllRecords),
            (false, Some(query), None) if !query.trim().is_empty() => {
                Ok(ExtractionScope::Query(query.clone()))
            }
            (false, None, Some(ids)) if !ids.is_empty() => Ok(ExtractionScope::SelectedRecords(
                ids.iter().cloned().collect::<BTreeSet<_>>(),
            )),
            _ => Err(AppError::ConfigError(format!(
                "{}: extract must specify exactly one of all, a non-empty query, or non-empty ids",
                self.sobject
            ))),
        }
    }

    /// Output file name, defaulting to `<sobject>.csv`.
    pub fn output_file(&self) -> String {
        self.file
            .clone()
            .unwrap_or_else(|| format!("{}.csv", self.sobject))
    }
}
