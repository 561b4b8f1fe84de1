//! Runtime table creation and alteration for SQLite.
//!
//! `oxide-schema` drives the planner in `oxide-schema-core` against a live
//! database:
//!
//! - **Introspect** - Reads tables, columns and foreign keys through the
//!   connection a mutation runs on
//! - **Coordinator** - Runs create and copy-rebuild-swap updates, each in a
//!   single transaction
//! - **Builtin** - The application tables every database starts with
//! - **Config** - Pool and connection settings
//!
//! SQLite cannot alter most column properties in place, so an update builds a
//! replacement table, copies the surviving columns, drops the original and
//! renames the replacement into its place. A failure at any step rolls the
//! whole change back.
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_schema::prelude::*;
//!
//! # async fn run() -> oxide_schema::error::Result<()> {
//! let pool = DatabaseConfig::new("sqlite:app.db").connect().await?;
//! let coordinator = SchemaCoordinator::new(pool);
//!
//! coordinator
//!     .create_table(
//!         &TableSpec::new("notes")
//!             .column(ColumnSpec::new("id", "INTEGER").not_null().primary_key())
//!             .column(ColumnSpec::new("body", "TEXT")),
//!     )
//!     .await?;
//!
//! // Keep `id`, drop `body`, add `title`.
//! let notes = coordinator
//!     .update_table(
//!         "notes",
//!         &TableSpec::unnamed()
//!             .column(ColumnSpec::new("id", "INTEGER").not_null().primary_key())
//!             .column(ColumnSpec::new("title", "VARCHAR(200)")),
//!     )
//!     .await?;
//! assert_eq!(notes.columns.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod builtin;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod introspect;
pub mod naming;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::builtin::{builtin_tables, ensure_builtin_tables};
    pub use crate::config::DatabaseConfig;
    pub use crate::coordinator::SchemaCoordinator;
    pub use crate::error::{Error, Result};
    pub use oxide_schema_core::{
        Catalog, ColumnSpec, DatabaseSchema, ForeignKeySpec, LiveColumn, LiveForeignKey,
        LiveTableSchema, MigrationPhase, SchemaError, SchemaStatement, TableSpec,
    };
}
