//! Client-declared table definitions.
//!
//! A [`TableSpec`] is the input of exactly one create or update call. It is
//! deserialized from the client's JSON as-is and only turned into sanitized
//! parts by [`TableSpec::validate_columns`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::ident::{DefaultExpr, Ident, TypeExpr};

/// A reference from a column to a column of another (or the same) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

/// One requested column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Storage type expression, e.g. `TEXT` or `VARCHAR(255)`.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value, as a literal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Whether this column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Optional foreign-key reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeySpec>,
}

const fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    /// Creates a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Makes the column reference `table(column)`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeySpec {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// A named, ordered list of columns.
///
/// The name is required when creating a table; on update it is the optional
/// final name of the rebuilt table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Columns in physical order.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Creates a named, empty table spec.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            columns: Vec::new(),
        }
    }

    /// Creates an unnamed spec, used for updates that keep the table name.
    #[must_use]
    pub const fn unnamed() -> Self {
        Self {
            name: None,
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Returns the validated table name.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidIdentifier`] when the name is missing or invalid.
    pub fn require_name(&self) -> Result<Ident> {
        match &self.name {
            Some(name) => Ident::new(name.as_str()),
            None => Err(SchemaError::InvalidIdentifier {
                value: String::new(),
                reason: "table name is required",
            }),
        }
    }

    /// Returns the validated final name, if one was given.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidIdentifier`] when the given name is invalid.
    pub fn final_name(&self) -> Result<Option<Ident>> {
        self.name.as_deref().map(Ident::new).transpose()
    }

    /// Sanitizes every column. `table` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns the first of [`SchemaError::InvalidIdentifier`],
    /// [`SchemaError::InvalidTypeExpression`], [`SchemaError::EmptyColumnList`]
    /// or [`SchemaError::DuplicateColumn`] encountered.
    pub fn validate_columns(&self, table: &str) -> Result<Vec<ValidatedColumn>> {
        if self.columns.is_empty() {
            return Err(SchemaError::EmptyColumnList(table.to_string()));
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let name = Ident::new(column.name.as_str())?;
            if !seen.insert(name.as_str().to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.to_string(),
                    column: column.name.clone(),
                });
            }

            let foreign_key = column
                .foreign_key
                .as_ref()
                .map(|fk| -> Result<ValidatedReference> {
                    Ok(ValidatedReference {
                        table: Ident::new(fk.table.as_str())?,
                        column: Ident::new(fk.column.as_str())?,
                    })
                })
                .transpose()?;

            validated.push(ValidatedColumn {
                name,
                sql_type: TypeExpr::parse(&column.sql_type)?,
                nullable: column.nullable,
                default: column.default.as_deref().map(DefaultExpr::parse),
                primary_key: column.primary_key,
                foreign_key,
            });
        }

        Ok(validated)
    }
}

/// A sanitized foreign-key target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReference {
    /// Referenced table.
    pub table: Ident,
    /// Referenced column.
    pub column: Ident,
}

/// A column whose every part passed the sanitizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedColumn {
    /// Column name.
    pub name: Ident,
    /// Normalized type.
    pub sql_type: TypeExpr,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default literal.
    pub default: Option<DefaultExpr>,
    /// Primary key flag.
    pub primary_key: bool,
    /// Foreign-key target.
    pub foreign_key: Option<ValidatedReference>,
}
