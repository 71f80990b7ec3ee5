//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod sqlite_adapter;
pub mod static_selector;
#[cfg(feature = "web")]
pub mod web;
