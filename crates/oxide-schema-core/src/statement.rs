//! Typed DDL statements.
//!
//! Every statement the engine runs is built from one of these structures and
//! rendered by [`SchemaStatement::to_sql`]. Only [`Ident`], [`TypeExpr`] and
//! [`DefaultExpr`] values reach the SQL text, never raw client strings.

use std::fmt;

use serde::Serialize;

use crate::ident::{DefaultExpr, Ident, TypeExpr};

/// Phase of a copy-rebuild-swap migration.
///
/// Phases only move forward: `Building → DataCopied → Swapped`. A plain
/// create runs entirely in `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MigrationPhase {
    /// The replacement table is being created.
    Building,
    /// Surviving rows are copied into the replacement table.
    DataCopied,
    /// The original table is dropped and the replacement renamed into place.
    Swapped,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Building => "Building",
            Self::DataCopied => "DataCopied",
            Self::Swapped => "Swapped",
        })
    }
}

/// One column inside a `CREATE TABLE` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: Ident,
    /// Column type.
    pub sql_type: TypeExpr,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default literal.
    pub default: Option<DefaultExpr>,
}

/// A named `FOREIGN KEY` table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    /// Constraint name.
    pub name: Ident,
    /// Constrained column.
    pub column: Ident,
    /// Referenced table.
    pub references_table: Ident,
    /// Referenced column.
    pub references_column: Ident,
}

/// A statement produced by the compiler or the migration planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatement {
    /// `CREATE TABLE`.
    CreateTable {
        /// Table name.
        table: Ident,
        /// Columns in order.
        columns: Vec<ColumnDef>,
        /// Primary-key columns. One column is declared inline, several as
        /// a table constraint.
        primary_key: Vec<Ident>,
        /// Foreign-key constraints, emitted after the columns.
        foreign_keys: Vec<ForeignKeyConstraint>,
    },

    /// `INSERT INTO .. SELECT` of the columns two tables share.
    CopyRows {
        /// Source table.
        from: Ident,
        /// Destination table.
        into: Ident,
        /// Columns copied, in destination order.
        columns: Vec<Ident>,
    },

    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        table: Ident,
    },

    /// `ALTER TABLE .. RENAME TO`.
    RenameTable {
        /// Current name.
        from: Ident,
        /// New name.
        to: Ident,
    },
}

impl SchemaStatement {
    /// Phase this statement belongs to.
    #[must_use]
    pub const fn phase(&self) -> MigrationPhase {
        match self {
            Self::CreateTable { .. } => MigrationPhase::Building,
            Self::CopyRows { .. } => MigrationPhase::DataCopied,
            Self::DropTable { .. } | Self::RenameTable { .. } => MigrationPhase::Swapped,
        }
    }

    /// Renders the statement as SQLite SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable {
                table,
                columns,
                primary_key,
                foreign_keys,
            } => create_table_sql(table, columns, primary_key, foreign_keys),

            Self::CopyRows {
                from,
                into,
                columns,
            } => {
                let list = join_idents(columns);
                format!("INSERT INTO {into} ({list}) SELECT {list} FROM {from}")
            }

            Self::DropTable { table } => format!("DROP TABLE {table}"),

            Self::RenameTable { from, to } => format!("ALTER TABLE {from} RENAME TO {to}"),
        }
    }
}

impl fmt::Display for SchemaStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn create_table_sql(
    table: &Ident,
    columns: &[ColumnDef],
    primary_key: &[Ident],
    foreign_keys: &[ForeignKeyConstraint],
) -> String {
    let inline_pk = match primary_key {
        [single] => Some(single),
        _ => None,
    };

    let mut parts: Vec<String> = columns
        .iter()
        .map(|column| column_sql(column, inline_pk.is_some_and(|pk| *pk == column.name)))
        .collect();

    if primary_key.len() > 1 {
        parts.push(format!("PRIMARY KEY ({})", join_idents(primary_key)));
    }

    parts.extend(foreign_keys.iter().map(|fk| {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            fk.name, fk.column, fk.references_table, fk.references_column
        )
    }));

    format!("CREATE TABLE {table} (\n  {}\n)", parts.join(",\n  "))
}

fn column_sql(column: &ColumnDef, primary_key: bool) -> String {
    let mut sql = format!("{} {}", column.name, column.sql_type);
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.to_sql());
    }
    if primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    sql
}

fn join_idents(idents: &[Ident]) -> String {
    idents
        .iter()
        .map(Ident::quoted)
        .collect::<Vec<_>>()
        .join(", ")
}
