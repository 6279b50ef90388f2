use thiserror::Error;

/// Application-wide error types for cascade.
///
/// Every variant aborts the run: an incomplete extraction is never reported
/// as a partial success.
#[derive(Error, Debug)]
pub enum AppError {
    /// A record identifier is neither a valid 15- nor 18-character id.
    #[error("Invalid record identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A requested field references this object type and at least one other.
    #[error("Field {sobject}.{field} is a polymorphic self-lookup and cannot be extracted")]
    UnsupportedPolymorphicSelfLookup { sobject: String, field: String },

    /// Registered dependencies the remote service never returned.
    #[error("Unresolved {sobject} dependencies: {}", ids.join(", "))]
    UnresolvedDependency { sobject: String, ids: Vec<String> },

    /// A requested field does not exist on the object type.
    #[error("Field {field} does not exist on {sobject}")]
    UnknownField { sobject: String, field: String },

    /// Obtaining a proxy object from the connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The describe call failed.
    #[error("Describe error: {0}")]
    DescribeError(String),

    /// A query was rejected or returned an unreadable response.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A record returned by the service lacks something the engine needs.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// No output sink was registered for the object type.
    #[error("No output sink registered for {0}")]
    MissingSink(String),

    /// Writing to an output sink failed.
    #[error("Sink error: {0}")]
    SinkError(String),

    /// An extraction step was driven out of order.
    #[error("Invalid step state: {0}")]
    InvalidState(String),

    /// Configuration or operation definition is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if the error came from the remote service rather than
    /// from the local run (configuration, data or sink).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::ConnectionError(_)
                | AppError::DescribeError(_)
                | AppError::QueryError(_)
                | AppError::HttpError(_)
                | AppError::Timeout(_)
        )
    }
}
