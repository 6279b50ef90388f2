pub mod config;
pub mod connection;
pub mod csv_sink;

pub use config::ConnectionConfig;
pub use connection::{RestConnection, SObjectHandle};
pub use csv_sink::CsvSink;
