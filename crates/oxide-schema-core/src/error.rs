//! Error kinds for schema definition and mutation.

use crate::statement::MigrationPhase;

/// Errors produced while validating, compiling or applying a schema change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A table or column name cannot be used as an identifier.
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A column type is outside the accepted type grammar.
    #[error("invalid type expression {0:?}")]
    InvalidTypeExpression(String),

    /// A table definition has no columns.
    #[error("table '{0}' must have at least one column")]
    EmptyColumnList(String),

    /// A table definition names the same column twice.
    #[error("column '{column}' is defined more than once in table '{table}'")]
    DuplicateColumn {
        /// Table being defined.
        table: String,
        /// Repeated column name.
        column: String,
    },

    /// A table with this name already exists.
    #[error("table '{0}' already exists")]
    DuplicateTableName(String),

    /// The named table does not exist.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// The generated rebuild table name is already taken.
    #[error("temporary table name '{0}' collides with an existing table")]
    TempNameCollision(String),

    /// A statement failed while the mutation was running; nothing was committed.
    #[error("schema mutation failed during {phase} phase: {cause}")]
    SchemaMutationFailed {
        /// Phase of the statement that failed.
        phase: MigrationPhase,
        /// Human-readable cause, usually the engine's message.
        cause: String,
    },
}

impl SchemaError {
    /// Builds a [`SchemaError::SchemaMutationFailed`] from any displayable cause.
    pub fn mutation_failed(phase: MigrationPhase, cause: impl std::fmt::Display) -> Self {
        Self::SchemaMutationFailed {
            phase,
            cause: cause.to_string(),
        }
    }

    /// Short machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "InvalidIdentifier",
            Self::InvalidTypeExpression(_) => "InvalidTypeExpression",
            Self::EmptyColumnList(_) => "EmptyColumnList",
            Self::DuplicateColumn { .. } => "DuplicateColumn",
            Self::DuplicateTableName(_) => "DuplicateTableName",
            Self::TableNotFound(_) => "TableNotFound",
            Self::TempNameCollision(_) => "TempNameCollision",
            Self::SchemaMutationFailed { .. } => "SchemaMutationFailed",
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
