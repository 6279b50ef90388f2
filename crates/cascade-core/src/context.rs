use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::AppError;
use crate::id::RecordId;
use crate::mapper::RecordMapper;
use crate::models::{DescribeResult, FieldDescriptor, FieldMap, Record};
use crate::traits::{Connection, RecordSink};

/// State shared by every step of one extraction run.
///
/// Schema metadata and proxies are fetched from the connection at most once
/// per object type. The context also tracks, per type, which identifiers have
/// been written and which are still owed to records that reference them.
pub struct OperationContext<C: Connection> {
    connection: C,
    sobjects: Vec<String>,
    proxies: HashMap<String, C::Proxy>,
    describes: HashMap<String, Arc<DescribeResult>>,
    field_maps: HashMap<String, Arc<FieldMap>>,
    dependencies: HashMap<String, HashSet<RecordId>>,
    extracted: HashMap<String, HashSet<RecordId>>,
    sinks: HashMap<String, Box<dyn RecordSink>>,
    mappers: HashMap<String, Box<dyn RecordMapper>>,
    written: HashMap<String, usize>,
}

impl<C: Connection> OperationContext<C> {
    /// Create a context for a run over `sobjects`.
    pub fn new<S: Into<String>>(connection: C, sobjects: impl IntoIterator<Item = S>) -> Self {
        Self {
            connection,
            sobjects: sobjects.into_iter().map(Into::into).collect(),
            proxies: HashMap::new(),
            describes: HashMap::new(),
            field_maps: HashMap::new(),
            dependencies: HashMap::new(),
            extracted: HashMap::new(),
            sinks: HashMap::new(),
            mappers: HashMap::new(),
            written: HashMap::new(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Object types participating in the run, in declaration order.
    pub fn sobjects(&self) -> &[String] {
        &self.sobjects
    }

    pub fn participates(&self, sobject: &str) -> bool {
        self.sobjects.iter().any(|s| s == sobject)
    }

    pub fn set_sink(&mut self, sobject: impl Into<String>, sink: Box<dyn RecordSink>) {
        self.sinks.insert(sobject.into(), sink);
    }

    pub fn set_mapper(&mut self, sobject: impl Into<String>, mapper: Box<dyn RecordMapper>) {
        self.mappers.insert(sobject.into(), mapper);
    }

    pub async fn get_proxy_object(&mut self, sobject: &str) -> Result<C::Proxy, AppError> {
        if let Some(proxy) = self.proxies.get(sobject) {
            return Ok(proxy.clone());
        }

        tracing::debug!(%sobject, "Creating proxy object");
        let proxy = self.connection.get_proxy(sobject).await?;
        self.proxies.insert(sobject.to_string(), proxy.clone());
        Ok(proxy)
    }

    pub async fn get_describe(&mut self, sobject: &str) -> Result<Arc<DescribeResult>, AppError> {
        if let Some(describe) = self.describes.get(sobject) {
            return Ok(Arc::clone(describe));
        }

        let proxy = self.get_proxy_object(sobject).await?;
        tracing::debug!(%sobject, "Describing object");
        let describe = Arc::new(self.connection.describe(&proxy).await?);
        self.describes
            .insert(sobject.to_string(), Arc::clone(&describe));
        Ok(describe)
    }

    pub async fn get_field_map(&mut self, sobject: &str) -> Result<Arc<FieldMap>, AppError> {
        if let Some(map) = self.field_maps.get(sobject) {
            return Ok(Arc::clone(map));
        }

        let map = Arc::new(self.get_describe(sobject).await?.field_map());
        self.field_maps.insert(sobject.to_string(), Arc::clone(&map));
        Ok(map)
    }

    /// Field descriptors of `sobject` accepted by `predicate`. Not cached.
    pub async fn get_filtered_field_map<P>(
        &mut self,
        sobject: &str,
        predicate: P,
    ) -> Result<FieldMap, AppError>
    where
        P: Fn(&FieldDescriptor) -> bool,
    {
        let map = self.get_field_map(sobject).await?;
        Ok(map
            .iter()
            .filter(|(_, descriptor)| predicate(descriptor))
            .map(|(name, descriptor)| (name.clone(), descriptor.clone()))
            .collect())
    }

    /// Record that `id` must be extracted for `sobject`.
    ///
    /// Identifiers already extracted are not registered.
    pub fn add_dependency(&mut self, sobject: &str, id: RecordId) {
        if self.is_extracted(sobject, &id) {
            return;
        }
        self.dependencies
            .entry(sobject.to_string())
            .or_default()
            .insert(id);
    }

    pub fn get_dependencies(&self, sobject: &str) -> HashSet<RecordId> {
        self.dependencies.get(sobject).cloned().unwrap_or_default()
    }

    pub fn has_dependencies(&self, sobject: &str) -> bool {
        self.dependencies
            .get(sobject)
            .is_some_and(|deps| !deps.is_empty())
    }

    pub fn get_extracted_ids(&self, sobject: &str) -> HashSet<RecordId> {
        self.extracted.get(sobject).cloned().unwrap_or_default()
    }

    pub fn is_extracted(&self, sobject: &str, id: &RecordId) -> bool {
        self.extracted
            .get(sobject)
            .is_some_and(|ids| ids.contains(id))
    }

    /// Number of records written to the sink of `sobject` so far.
    pub fn records_written(&self, sobject: &str) -> usize {
        self.written.get(sobject).copied().unwrap_or(0)
    }

    /// Persist one record of `sobject`.
    ///
    /// The registered mapper (if any) runs first and its output is what gets
    /// registered and written. Storing an identifier satisfies any pending
    /// dependency on it.
    pub fn store_result(&mut self, sobject: &str, record: Record) -> Result<(), AppError> {
        let record = match self.mappers.get(sobject) {
            Some(mapper) => mapper.transform_record(&record),
            None => record,
        };

        let id = record.id()?;
        let sink = self
            .sinks
            .get_mut(sobject)
            .ok_or_else(|| AppError::MissingSink(sobject.to_string()))?;

        sink.write(&record)?;
        *self.written.entry(sobject.to_string()).or_default() += 1;

        if let Some(deps) = self.dependencies.get_mut(sobject) {
            deps.remove(&id);
        }
        self.extracted
            .entry(sobject.to_string())
            .or_default()
            .insert(id);
        Ok(())
    }

    /// Identifiers already extracted for every object type `field` on
    /// `sobject` may point at.
    ///
    /// Rebuilt from the extracted registry on every call.
    pub async fn get_sobject_ids_for_reference(
        &mut self,
        sobject: &str,
        field: &str,
    ) -> Result<HashSet<RecordId>, AppError> {
        let map = self.get_field_map(sobject).await?;
        let descriptor = map.get(field).ok_or_else(|| AppError::UnknownField {
            sobject: sobject.to_string(),
            field: field.to_string(),
        })?;

        let mut ids = HashSet::new();
        for target in &descriptor.reference_to {
            if let Some(extracted) = self.extracted.get(target) {
                ids.extend(extracted.iter().cloned());
            }
        }
        Ok(ids)
    }

    /// Flush every registered sink.
    pub fn flush(&mut self) -> Result<(), AppError> {
        for sink in self.sinks.values_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}
