pub mod context;
pub mod definition;
pub mod error;
pub mod id;
pub mod mapper;
pub mod models;
pub mod operation;
pub mod query;
pub mod step;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::OperationContext;
pub use definition::{OperationDefinition, StepDefinition};
pub use error::AppError;
pub use id::RecordId;
pub use mapper::{FieldMapper, RecordMapper, ValueTransform};
pub use models::{DescribeResult, FieldDescriptor, FieldMap, FieldValue, Record};
pub use operation::{ExtractOperation, OperationSummary, StepSummary};
pub use query::{QueryFilter, build_query};
pub use step::{ExtractionScope, ExtractionStep, StepState};
pub use traits::{Connection, NullSink, RecordSink};
