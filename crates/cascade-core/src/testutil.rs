//! Test utilities: in-memory implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls after the context has taken ownership.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::id::RecordId;
use crate::mapper::RecordMapper;
use crate::models::{DescribeResult, FieldDescriptor, FieldValue, ID_FIELD, Record};
use crate::query::QueryFilter;
use crate::traits::{Connection, RecordSink};

pub fn id(raw: &str) -> RecordId {
    RecordId::parse(raw).unwrap()
}

/// `{Id, Name}` record.
pub fn account(raw_id: &str, name: &str) -> Record {
    [
        (ID_FIELD, FieldValue::from(raw_id)),
        ("Name", FieldValue::from(name)),
    ]
    .into_iter()
    .collect()
}

/// Record from `(field, value)` pairs where `None` is a null value.
pub fn record(pairs: &[(&str, Option<&str>)]) -> Record {
    pairs
        .iter()
        .map(|(field, value)| (*field, FieldValue::from(*value)))
        .collect()
}

/// Describe payload from `(field, referenceTo)` pairs.
pub fn describe(fields: &[(&str, &[&str])]) -> DescribeResult {
    DescribeResult {
        fields: fields
            .iter()
            .map(|(name, targets)| FieldDescriptor {
                name: name.to_string(),
                field_type: if *name == ID_FIELD {
                    "id".to_string()
                } else if targets.is_empty() {
                    "string".to_string()
                } else {
                    "reference".to_string()
                },
                reference_to: targets.iter().map(|t| t.to_string()).collect(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// MockConnection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MockProxy {
    pub sobject: String,
}

/// A recorded query: (sobject, field list, filter).
pub type QueryCall = (String, String, QueryFilter);

#[derive(Default)]
struct MockState {
    describes: HashMap<String, DescribeResult>,
    records: HashMap<String, Vec<Record>>,
    failing_proxies: HashSet<String>,
    failing_describes: HashSet<String>,
    proxy_calls: HashMap<String, usize>,
    describe_calls: HashMap<String, usize>,
    queries: Vec<QueryCall>,
}

/// In-memory platform: object schemas plus the records each query can see.
///
/// `IdIn` filters match on the referenced field; `Condition` filters
/// understand a single `Field = 'value'` comparison.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(
        self,
        sobject: &str,
        fields: &[(&str, &[&str])],
        records: Vec<Record>,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.describes.insert(sobject.to_string(), describe(fields));
            state.records.insert(sobject.to_string(), records);
        }
        self
    }

    pub fn failing_proxy(self, sobject: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_proxies
            .insert(sobject.to_string());
        self
    }

    pub fn failing_describe(self, sobject: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_describes
            .insert(sobject.to_string());
        self
    }

    pub fn proxy_calls(&self, sobject: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.proxy_calls.get(sobject).copied().unwrap_or(0)
    }

    pub fn describe_calls(&self, sobject: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.describe_calls.get(sobject).copied().unwrap_or(0)
    }

    pub fn queries(&self) -> Vec<QueryCall> {
        self.state.lock().unwrap().queries.clone()
    }

    fn matches(record: &Record, filter: &QueryFilter) -> bool {
        match filter {
            QueryFilter::All => true,
            QueryFilter::Condition(condition) => {
                let Some((field, value)) = condition.split_once(" = ") else {
                    return false;
                };
                let value = value.trim().trim_matches('\'');
                record
                    .get(field.trim())
                    .is_some_and(|v| v.to_string() == value)
            }
            QueryFilter::IdIn { field, ids } => match record.reference(field) {
                Ok(Some(id)) => ids.contains(&id),
                _ => false,
            },
        }
    }
}

impl Connection for MockConnection {
    type Proxy = MockProxy;

    async fn get_proxy(&self, sobject: &str) -> Result<MockProxy, AppError> {
        let mut state = self.state.lock().unwrap();
        *state.proxy_calls.entry(sobject.to_string()).or_default() += 1;
        if state.failing_proxies.contains(sobject) {
            return Err(AppError::ConnectionError(format!(
                "object {sobject} is not available"
            )));
        }
        Ok(MockProxy {
            sobject: sobject.to_string(),
        })
    }

    async fn describe(&self, proxy: &MockProxy) -> Result<DescribeResult, AppError> {
        let mut state = self.state.lock().unwrap();
        *state
            .describe_calls
            .entry(proxy.sobject.clone())
            .or_default() += 1;
        if state.failing_describes.contains(&proxy.sobject) {
            return Err(AppError::DescribeError(format!(
                "cannot describe {}",
                proxy.sobject
            )));
        }
        state
            .describes
            .get(&proxy.sobject)
            .cloned()
            .ok_or_else(|| AppError::DescribeError(format!("unknown object {}", proxy.sobject)))
    }

    async fn query(
        &self,
        sobject: &str,
        field_list: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<Record>, AppError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((
            sobject.to_string(),
            field_list.to_string(),
            filter.clone(),
        ));
        Ok(state
            .records
            .get(sobject)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| Self::matches(r, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that keeps every written record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    written: Arc<Mutex<Vec<Record>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.written.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records().iter().map(|r| r.id().unwrap()).collect()
    }
}

impl RecordSink for RecordingSink {
    fn write(&mut self, record: &Record) -> Result<(), AppError> {
        self.written.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Sink whose every write fails.
#[derive(Clone, Default)]
pub struct FailingSink;

impl RecordSink for FailingSink {
    fn write(&mut self, _record: &Record) -> Result<(), AppError> {
        Err(AppError::SinkError("disk full".into()))
    }
}

// ---------------------------------------------------------------------------
// StubMapper
// ---------------------------------------------------------------------------

/// Mapper that records its inputs and always returns the same record.
#[derive(Clone)]
pub struct StubMapper {
    calls: Arc<Mutex<Vec<Record>>>,
    output: Record,
}

impl StubMapper {
    pub fn returning(output: Record) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            output,
        }
    }

    pub fn calls(&self) -> Vec<Record> {
        self.calls.lock().unwrap().clone()
    }
}

impl RecordMapper for StubMapper {
    fn transform_key(&self, name: &str) -> String {
        name.to_string()
    }

    fn transform_value(&self, _name: &str, value: &FieldValue) -> FieldValue {
        value.clone()
    }

    fn transform_record(&self, record: &Record) -> Record {
        self.calls.lock().unwrap().push(record.clone());
        self.output.clone()
    }
}
