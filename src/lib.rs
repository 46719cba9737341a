//! Referential-integrity auditing and repair for hierarchical, localized and
//! workspace-aware tables.
//!
//! The engine reads table capabilities from a [`schema::SchemaProvider`], talks
//! to the database only through a [`store::RowStore`], and runs the ordered
//! [`checks::catalogue`] through a [`pipeline::Orchestrator`].

pub mod affected;
pub mod audit;
pub mod checks;
pub mod console;
mod error;
pub mod integrity_errors;
pub mod logging;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod rootline;
pub mod schema;
pub mod store;
pub mod tree;

pub use affected::{AffectedRow, AffectedRows};
pub use checks::{Check, CheckContext, CheckRegistry, RepairClass};
pub use error::{AppError, AppResult};
pub use pipeline::{CheckState, ExecutionMode, Orchestrator, RunSummary};
pub use policy::{decide, RepairAction, TablePolicy};
pub use schema::{SchemaDocument, SchemaProvider, StaticSchema};
pub use store::{Row, RowStore, SqliteStore, Value};
