//! # Report Core
//!
//! Keeps a map report's `displayOptions` document current and internally
//! consistent.
//!
//! ## Pipeline
//!
//! ```text
//! stored entity ──> migrate ──┐
//!                             ├──> clean_up_layer_references ──> editor ──> prepare_for_mutation ──> mutation
//! new data source ──> factory ┘             ^                       │
//!                                           └── after layer removal ┘
//! ```
//!
//! Every stage takes a document and returns a new one. Nothing here performs
//! I/O; the editor reaches the API only through the [`ReportExecutor`] it is
//! given.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use report_core::{clean_up_layer_references, create_report_for_source};
//!
//! let report = create_report_for_source("Members", "source-1");
//! let cleaned = clean_up_layer_references(&report.display_options, &HashSet::new());
//! assert!(cleaned.area_explorer.displays.is_empty());
//! ```

mod config;
mod editor;
mod error;
mod factory;
mod integrity;
mod migrate;
mod sanitize;

pub use config::{FactoryConfig, ReportConfig, SanitizeConfig};
pub use editor::{CredentialProvider, Credentials, ReportEditor, ReportExecutor};
pub use error::{ReportError, Result};
pub use factory::{create_report_for_source, ReportFactory};
pub use integrity::{
    clean_report, clean_up_layer_references, dangling_layer_references, DanglingReference,
};
pub use migrate::{
    hydrate_report, migrate, migrate_optional, migrate_with_ids, migrate_with_report,
    MigrationReport, MigrationStep, StoredShape,
};
pub use sanitize::{prepare_for_mutation, MapReportInput, Sanitizer};

pub use report_protocol as protocol;
