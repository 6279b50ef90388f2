use uuid::Uuid;

use crate::context::OperationContext;
use crate::error::AppError;
use crate::step::{ExtractionScope, ExtractionStep};
use crate::traits::Connection;

/// Records written for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub sobject: String,
    pub records: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub run_id: Uuid,
    pub steps: Vec<StepSummary>,
}

impl OperationSummary {
    pub fn total_records(&self) -> usize {
        self.steps.iter().map(|s| s.records).sum()
    }
}

/// Runs extraction steps in declaration order, then chases the
/// dependencies steps registered on each other.
pub struct ExtractOperation<C: Connection> {
    run_id: Uuid,
    context: OperationContext<C>,
    steps: Vec<ExtractionStep>,
}

impl<C: Connection> ExtractOperation<C> {
    pub fn new(context: OperationContext<C>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            context,
            steps: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn context(&self) -> &OperationContext<C> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut OperationContext<C> {
        &mut self.context
    }

    pub fn steps(&self) -> &[ExtractionStep] {
        &self.steps
    }

    /// Append a step. Construction errors (unknown or polymorphic
    /// self-lookup fields) surface here, before anything is extracted.
    pub async fn add_step(
        &mut self,
        sobject: impl Into<String>,
        scope: ExtractionScope,
        fields: Vec<String>,
    ) -> Result<(), AppError> {
        let step = ExtractionStep::new(sobject, scope, fields, &mut self.context).await?;
        self.steps.push(step);
        Ok(())
    }

    /// Extract every step, then resolve cross-type dependencies.
    ///
    /// Each resolution round either extracts every identifier it asked for
    /// or fails, so the loop ends once no type owes anything.
    pub async fn execute(&mut self) -> Result<OperationSummary, AppError> {
        tracing::info!(run_id = %self.run_id, steps = self.steps.len(), "Starting extraction");

        for step in &mut self.steps {
            step.execute(&mut self.context).await?;
        }

        let mut round = 0;
        loop {
            let pending: Vec<usize> = (0..self.steps.len())
                .filter(|&i| self.context.has_dependencies(self.steps[i].sobject()))
                .collect();
            if pending.is_empty() {
                break;
            }

            round += 1;
            tracing::info!(
                run_id = %self.run_id,
                round,
                sobjects = ?pending.iter().map(|&i| self.steps[i].sobject()).collect::<Vec<_>>(),
                "Resolving cross-object dependencies"
            );
            for i in pending {
                self.steps[i]
                    .resolve_registered_dependencies(&mut self.context)
                    .await?;
            }
        }

        // Types without a step of their own have nobody to fetch what they owe.
        if let Some(sobject) = self
            .context
            .sobjects()
            .iter()
            .find(|s| self.context.has_dependencies(s))
        {
            let mut ids: Vec<String> = self
                .context
                .get_dependencies(sobject)
                .iter()
                .map(|id| id.to_string())
                .collect();
            ids.sort();
            tracing::warn!(
                run_id = %self.run_id,
                %sobject,
                missing = ids.len(),
                "Dependencies registered for an object type with no step"
            );
            return Err(AppError::UnresolvedDependency {
                sobject: sobject.clone(),
                ids,
            });
        }

        self.context.flush()?;

        let summary = OperationSummary {
            run_id: self.run_id,
            steps: self
                .steps
                .iter()
                .map(|step| StepSummary {
                    sobject: step.sobject().to_string(),
                    records: self.context.records_written(step.sobject()),
                })
                .collect(),
        };
        tracing::info!(
            run_id = %self.run_id,
            records = summary.total_records(),
            "Extraction complete"
        );
        Ok(summary)
    }
}
