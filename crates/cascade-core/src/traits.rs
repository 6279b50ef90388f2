use std::future::Future;

use crate::error::AppError;
use crate::models::{DescribeResult, Record};
use crate::query::QueryFilter;

/// Access to the remote platform.
pub trait Connection: Send + Sync {
    /// Service-side handle for one object type.
    type Proxy: Clone + Send + Sync;

    /// Obtain the proxy for an object type.
    fn get_proxy(
        &self,
        sobject: &str,
    ) -> impl Future<Output = Result<Self::Proxy, AppError>> + Send;

    /// Fetch the field schema behind a proxy.
    fn describe(
        &self,
        proxy: &Self::Proxy,
    ) -> impl Future<Output = Result<DescribeResult, AppError>> + Send;

    /// Run a query and drain every page of its results.
    fn query(
        &self,
        sobject: &str,
        field_list: &str,
        filter: &QueryFilter,
    ) -> impl Future<Output = Result<Vec<Record>, AppError>> + Send;
}

/// Destination for the records of one object type.
pub trait RecordSink: Send {
    fn write(&mut self, record: &Record) -> Result<(), AppError>;

    fn flush(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

/// A sink that discards everything, for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn write(&mut self, _record: &Record) -> Result<(), AppError> {
        Ok(())
    }
}
