#![forbid(unsafe_code)]

//! Core domain model and business logic for the Glyco glucose log.
//!
//! This crate provides:
//! - Domain types (entries, categories, medication snapshots)
//! - The statistics engine and the dashboard built on it
//! - Persistence (per-user entry store, medication catalog)
//! - CSV export and JSON backup/restore

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod persist;
pub mod store;
pub mod meds;
pub mod stats;
pub mod dashboard;
pub mod export;
pub mod backup;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::{load_last_user, save_last_user, EntryStore};
pub use meds::{Medication, MedicationCatalog, MedicationPatch, MedicationStore};
pub use dashboard::DashboardSummary;
pub use export::export_entries_csv;
pub use backup::Backup;
