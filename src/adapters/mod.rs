//! Concrete adapter implementations for ports.

#[cfg(feature = "http")]
pub mod http_provider_adapter;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
