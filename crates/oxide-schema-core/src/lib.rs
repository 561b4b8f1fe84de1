//! # oxide-schema-core
//!
//! Driver-agnostic core of the runtime schema engine: callers describe a table
//! as a [`TableSpec`], and this crate turns it into typed DDL.
//!
//! - [`ident`]: the sanitizer. Names, types and defaults are validated and
//!   quoted before they can reach SQL text.
//! - [`spec`]: client-declared table definitions (`serde`-compatible with the
//!   JSON the API accepts).
//! - [`catalog`]: introspected table state and the [`Catalog`] trait the
//!   compiler reads it through.
//! - [`statement`]: typed statements and [`MigrationPhase`].
//! - [`compile`]: the create compiler and the copy-rebuild-swap planner.
//!
//! Nothing here touches a database. Driver crates (see `oxide-schema`)
//! introspect the catalog, run the statements and own the transaction.
//!
//! ## Example
//!
//! ```rust
//! use oxide_schema_core::{ColumnSpec, DatabaseSchema, TableSpec, compile_create, compile_update};
//!
//! let catalog = DatabaseSchema::new();
//! let spec = TableSpec::new("notes")
//!     .column(ColumnSpec::new("id", "INTEGER").not_null().primary_key())
//!     .column(ColumnSpec::new("body", "TEXT").default_value(""));
//!
//! let create = compile_create(&catalog, &spec).unwrap();
//! assert!(create.to_sql().starts_with("CREATE TABLE \"notes\""));
//!
//! // Updating a table that is not in the catalog fails before planning.
//! assert!(compile_update(&catalog, "notes", &spec, "notes__rebuild_1").is_err());
//! ```

pub mod catalog;
pub mod compile;
pub mod error;
pub mod ident;
pub mod spec;
pub mod statement;

pub use catalog::{Catalog, DatabaseSchema, LiveColumn, LiveForeignKey, LiveTableSchema};
pub use compile::{MigrationPlan, compile_create, compile_update, unresolved_references};
pub use error::{Result, SchemaError};
pub use ident::{DefaultExpr, Ident, TypeExpr};
pub use spec::{ColumnSpec, ForeignKeySpec, TableSpec, ValidatedColumn, ValidatedReference};
pub use statement::{ColumnDef, ForeignKeyConstraint, MigrationPhase, SchemaStatement};
