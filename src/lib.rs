//! Library crate for scan-table-rs: a headless live result table for LAN scans.
pub mod config;
pub mod error;
pub mod events;
pub mod fetchers;
pub mod ports;
pub mod scanner;
pub mod store;
pub mod targets;
pub mod types;
pub mod ui;
pub mod view;

pub use error::TableError;
pub use store::ResultStore;
pub use view::{ResultTable, RowChange};
