use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::context::OperationContext;
use crate::error::AppError;
use crate::id::RecordId;
use crate::models::{ID_FIELD, Record};
use crate::query::QueryFilter;
use crate::traits::Connection;

/// Which records of an object type the primary pass requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionScope {
    AllRecords,
    /// Records matching a query condition.
    Query(String),
    /// An explicit set of records.
    SelectedRecords(BTreeSet<RecordId>),
}

impl ExtractionScope {
    /// The primary-pass queries for this scope.
    pub fn filters(&self) -> Vec<QueryFilter> {
        match self {
            ExtractionScope::AllRecords => vec![QueryFilter::All],
            ExtractionScope::Query(condition) => vec![QueryFilter::Condition(condition.clone())],
            ExtractionScope::SelectedRecords(ids) => QueryFilter::ids(ids),
        }
    }
}

/// Progress of an [`ExtractionStep`]. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepState {
    Created,
    FieldListResolved,
    PrimaryPassComplete,
    LookupPassesComplete,
    DependenciesResolved,
    Done,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Extraction of a single object type.
///
/// Runs a primary query for the scope, one lookup pass per self-lookup field
/// to pull in records pointing at what was already extracted, then fetches
/// any identifiers still owed to extracted records.
///
/// Descendants are followed one level per self-lookup field; a chain that
/// only becomes visible after the final lookup pass is not chased further.
#[derive(Debug)]
pub struct ExtractionStep {
    sobject: String,
    scope: ExtractionScope,
    fields: Vec<String>,
    self_lookups: Vec<String>,
    /// `(field, target)` for single-target references to other types in the run.
    dependent_lookups: Vec<(String, String)>,
    state: StepState,
}

impl ExtractionStep {
    /// Build a step, classifying the requested reference fields.
    ///
    /// Fails with [`AppError::UnsupportedPolymorphicSelfLookup`] for a field
    /// that may point at this object type and at some other type.
    pub async fn new<C: Connection>(
        sobject: impl Into<String>,
        scope: ExtractionScope,
        fields: Vec<String>,
        ctx: &mut OperationContext<C>,
    ) -> Result<Self, AppError> {
        let sobject = sobject.into();
        let field_map = ctx.get_field_map(&sobject).await?;

        let mut self_lookups = Vec::new();
        let mut dependent_lookups = Vec::new();
        for field in &fields {
            let descriptor = field_map.get(field).ok_or_else(|| AppError::UnknownField {
                sobject: sobject.clone(),
                field: field.clone(),
            })?;

            if descriptor.reference_to.iter().any(|t| *t == sobject) {
                if !descriptor.is_self_lookup(&sobject) {
                    return Err(AppError::UnsupportedPolymorphicSelfLookup {
                        sobject,
                        field: field.clone(),
                    });
                }
                self_lookups.push(field.clone());
            } else if let [target] = descriptor.reference_to.as_slice()
                && ctx.participates(target)
            {
                dependent_lookups.push((field.clone(), target.clone()));
            }
        }

        tracing::debug!(
            %sobject,
            self_lookups = ?self_lookups,
            dependent_lookups = ?dependent_lookups,
            "Extraction step created"
        );

        Ok(Self {
            sobject,
            scope,
            fields,
            self_lookups,
            dependent_lookups,
            state: StepState::Created,
        })
    }

    pub fn sobject(&self) -> &str {
        &self.sobject
    }

    pub fn scope(&self) -> &ExtractionScope {
        &self.scope
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Requested fields that reference only this object type, in request order.
    pub fn self_lookups(&self) -> &[String] {
        &self.self_lookups
    }

    pub fn get_field_list(&self) -> String {
        self.fields.join(", ")
    }

    /// Register the references a record carries, then persist it.
    ///
    /// A record that was already extracted for this type is skipped.
    pub fn store_result<C: Connection>(
        &self,
        record: Record,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        let id = record.id()?;
        if ctx.is_extracted(&self.sobject, &id) {
            tracing::debug!(sobject = %self.sobject, %id, "Skipping already extracted record");
            return Ok(());
        }

        for field in &self.self_lookups {
            if let Some(target_id) = record.reference(field)?
                && !ctx.is_extracted(&self.sobject, &target_id)
            {
                ctx.add_dependency(&self.sobject, target_id);
            }
        }

        for (field, target) in &self.dependent_lookups {
            if let Some(target_id) = record.reference(field)?
                && !ctx.is_extracted(target, &target_id)
            {
                ctx.add_dependency(target, target_id);
            }
        }

        ctx.store_result(&self.sobject, record)
    }

    async fn run_query<C: Connection>(
        &self,
        filter: &QueryFilter,
        ctx: &mut OperationContext<C>,
    ) -> Result<usize, AppError> {
        let records = ctx
            .connection()
            .query(&self.sobject, &self.get_field_list(), filter)
            .await?;
        let count = records.len();
        for record in records {
            self.store_result(record, ctx)?;
        }
        Ok(count)
    }

    /// Extract records whose `field` holds one of `ids`.
    pub async fn perform_id_field_pass<C: Connection>(
        &self,
        field: &str,
        ids: &HashSet<RecordId>,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        let mut returned = 0;
        for filter in QueryFilter::id_batches(field, ids) {
            returned += self.run_query(&filter, ctx).await?;
        }
        tracing::info!(
            sobject = %self.sobject,
            %field,
            requested = ids.len(),
            returned,
            "Identifier pass complete"
        );
        Ok(())
    }

    /// Extract records whose self-lookup `field` points at an already
    /// extracted record.
    pub async fn perform_lookup_pass<C: Connection>(
        &self,
        field: &str,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        let ids = ctx.get_sobject_ids_for_reference(&self.sobject, field).await?;
        self.perform_id_field_pass(field, &ids, ctx).await
    }

    /// Run the primary query for this step's scope.
    pub async fn perform_bulk_api_pass<C: Connection>(
        &self,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        let mut returned = 0;
        for filter in self.scope.filters() {
            returned += self.run_query(&filter, ctx).await?;
        }
        tracing::info!(sobject = %self.sobject, returned, "Primary pass complete");
        Ok(())
    }

    /// Fetch every identifier currently registered as a dependency of this
    /// object type.
    ///
    /// Fails with [`AppError::UnresolvedDependency`] if the service did not
    /// return a record for each requested identifier.
    pub async fn resolve_registered_dependencies<C: Connection>(
        &self,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        let requested = ctx.get_dependencies(&self.sobject);
        if requested.is_empty() {
            return Ok(());
        }

        self.perform_id_field_pass(ID_FIELD, &requested, ctx).await?;

        let mut missing: Vec<String> = requested
            .iter()
            .filter(|id| !ctx.is_extracted(&self.sobject, id))
            .map(|id| id.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        missing.sort();
        tracing::warn!(
            sobject = %self.sobject,
            missing = missing.len(),
            "Dependencies were not returned by the service"
        );
        Err(AppError::UnresolvedDependency {
            sobject: self.sobject.clone(),
            ids: missing,
        })
    }

    /// Run every pass of the step in order.
    pub async fn execute<C: Connection>(
        &mut self,
        ctx: &mut OperationContext<C>,
    ) -> Result<(), AppError> {
        if self.state != StepState::Created {
            return Err(AppError::InvalidState(format!(
                "{} step already ran (state {})",
                self.sobject, self.state
            )));
        }

        tracing::info!(
            sobject = %self.sobject,
            fields = %self.get_field_list(),
            "Extracting"
        );
        self.state = StepState::FieldListResolved;

        self.perform_bulk_api_pass(ctx).await?;
        self.state = StepState::PrimaryPassComplete;

        for field in &self.self_lookups {
            self.perform_lookup_pass(field, ctx).await?;
        }
        self.state = StepState::LookupPassesComplete;

        // Each round fetches the ancestors registered by the previous one.
        while ctx.has_dependencies(&self.sobject) {
            self.resolve_registered_dependencies(ctx).await?;
        }
        self.state = StepState::DependenciesResolved;

        self.state = StepState::Done;
        tracing::info!(
            sobject = %self.sobject,
            written = ctx.records_written(&self.sobject),
            "Extraction step done"
        );
        Ok(())
    }
}
