//! Create-table compiler and copy-rebuild-swap planner.
//!
//! SQLite cannot change a column's type, nullability, default or key
//! constraints in place, so every update is planned as a full rebuild:
//!
//! 1. create the replacement table under a temporary name,
//! 2. copy the columns both schemas share,
//! 3. drop the original,
//! 4. rename the replacement to the original name (or straight to the new
//!    spelling when only the case changes),
//! 5. optionally rename it once more to the requested final name.
//!
//! Both entry points are pure: they read a [`Catalog`] snapshot and return
//! statements. Executing them is the caller's job.

use crate::catalog::Catalog;
use crate::error::{Result, SchemaError};
use crate::ident::Ident;
use crate::spec::{TableSpec, ValidatedColumn};
use crate::statement::{ColumnDef, ForeignKeyConstraint, SchemaStatement};

/// Compiles a `CREATE TABLE` statement for a new table.
///
/// # Errors
///
/// Sanitizer errors for the name and columns, [`SchemaError::EmptyColumnList`],
/// [`SchemaError::DuplicateColumn`], and [`SchemaError::DuplicateTableName`]
/// when the catalog already has a table of that name.
pub fn compile_create(catalog: &impl Catalog, spec: &TableSpec) -> Result<SchemaStatement> {
    let table = spec.require_name()?;
    let columns = spec.validate_columns(table.as_str())?;

    if catalog.contains_table(table.as_str()) {
        return Err(SchemaError::DuplicateTableName(table.as_str().to_string()));
    }

    create_statement(&table, &columns)
}

fn create_statement(table: &Ident, columns: &[ValidatedColumn]) -> Result<SchemaStatement> {
    let mut defs = Vec::with_capacity(columns.len());
    let mut primary_key = Vec::new();
    let mut foreign_keys = Vec::new();

    for (ordinal, column) in columns.iter().enumerate() {
        defs.push(ColumnDef {
            name: column.name.clone(),
            sql_type: column.sql_type.clone(),
            nullable: column.nullable,
            default: column.default.clone(),
        });

        if column.primary_key {
            primary_key.push(column.name.clone());
        }

        if let Some(reference) = &column.foreign_key {
            // The ordinal keeps names distinct when a column name recurs.
            let name = format!(
                "fk_{}_{}_{}",
                table.as_str(),
                column.name.as_str(),
                ordinal
            );
            foreign_keys.push(ForeignKeyConstraint {
                name: Ident::new(name)?,
                column: column.name.clone(),
                references_table: reference.table.clone(),
                references_column: reference.column.clone(),
            });
        }
    }

    Ok(SchemaStatement::CreateTable {
        table: table.clone(),
        columns: defs,
        primary_key,
        foreign_keys,
    })
}

/// The ordered statements that rebuild one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// The existing table, spelled as in the catalog.
    pub source: Ident,
    /// Temporary name of the replacement table.
    pub temp: Ident,
    /// Name of the table once the plan has run.
    pub target: Ident,
    /// Columns whose data survives, in new-spec order.
    pub copied_columns: Vec<Ident>,
    /// Statements, to be run strictly in order.
    pub statements: Vec<SchemaStatement>,
}

impl MigrationPlan {
    /// Whether the table ends up under a different name.
    #[must_use]
    pub fn renames(&self) -> bool {
        self.source != self.target
    }

    /// Names the rebuilt table is known by during the plan.
    #[must_use]
    pub fn aliases(&self) -> [&Ident; 3] {
        [&self.source, &self.temp, &self.target]
    }

    /// Renders every statement.
    #[must_use]
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(SchemaStatement::to_sql).collect()
    }
}

/// Plans the rebuild of `existing` into the shape described by `spec`.
///
/// Data is carried over only for columns whose names match exactly; columns
/// that are missing from `spec` are dropped with their data.
///
/// # Errors
///
/// [`SchemaError::TableNotFound`] if `existing` is not in the catalog,
/// sanitizer and column-list errors for `spec`,
/// [`SchemaError::TempNameCollision`] if `temp_name` is taken, and
/// [`SchemaError::DuplicateTableName`] if the requested final name belongs to
/// another table.
pub fn compile_update(
    catalog: &impl Catalog,
    existing: &str,
    spec: &TableSpec,
    temp_name: &str,
) -> Result<MigrationPlan> {
    let live = catalog
        .lookup(existing)
        .ok_or_else(|| SchemaError::TableNotFound(existing.to_string()))?;
    let source = Ident::new(live.name.as_str())?;

    let final_name = spec.final_name()?;
    let columns = spec.validate_columns(source.as_str())?;

    let temp = Ident::new(temp_name)?;
    if catalog.contains_table(temp.as_str()) {
        return Err(SchemaError::TempNameCollision(temp.as_str().to_string()));
    }

    let target = match final_name {
        Some(name) if name != source => {
            if !source.matches(name.as_str()) && catalog.contains_table(name.as_str()) {
                return Err(SchemaError::DuplicateTableName(name.as_str().to_string()));
            }
            name
        }
        _ => source.clone(),
    };

    let copied_columns: Vec<Ident> = columns
        .iter()
        .filter(|column| live.column(column.name.as_str()).is_some())
        .map(|column| column.name.clone())
        .collect();

    let mut statements = vec![create_statement(&temp, &columns)?];
    if !copied_columns.is_empty() {
        statements.push(SchemaStatement::CopyRows {
            from: source.clone(),
            into: temp.clone(),
            columns: copied_columns.clone(),
        });
    }
    statements.push(SchemaStatement::DropTable {
        table: source.clone(),
    });
    // SQLite sees `t` and `T` as the same table, so a change of case only
    // is applied by the swap rename itself.
    let swap_name = if source.matches(target.as_str()) {
        &target
    } else {
        &source
    };
    statements.push(SchemaStatement::RenameTable {
        from: temp.clone(),
        to: swap_name.clone(),
    });
    if target != *swap_name {
        statements.push(SchemaStatement::RenameTable {
            from: source.clone(),
            to: target.clone(),
        });
    }

    Ok(MigrationPlan {
        source,
        temp,
        target,
        copied_columns,
        statements,
    })
}

/// Lists foreign keys of a `CREATE TABLE` statement whose target does not
/// resolve against the catalog.
///
/// References to any of `aliases` are self-references and resolve against
/// the statement's own columns. Other statement kinds never have problems.
#[must_use]
pub fn unresolved_references(
    catalog: &impl Catalog,
    statement: &SchemaStatement,
    aliases: &[&Ident],
) -> Vec<String> {
    let SchemaStatement::CreateTable {
        columns,
        foreign_keys,
        ..
    } = statement
    else {
        return Vec::new();
    };

    foreign_keys
        .iter()
        .filter_map(|fk| {
            let table = fk.references_table.as_str();
            let column = fk.references_column.as_str();

            let column_exists = if aliases.iter().any(|alias| alias.matches(table)) {
                columns.iter().any(|c| c.name.matches(column))
            } else {
                match catalog.lookup(table) {
                    Some(live) => live.find_column(column).is_some(),
                    None => {
                        return Some(format!(
                            "table '{table}' referenced by column '{}' does not exist",
                            fk.column.as_str()
                        ));
                    }
                }
            };

            (!column_exists).then(|| {
                format!(
                    "column '{column}' referenced by column '{}' does not exist in table '{table}'",
                    fk.column.as_str()
                )
            })
        })
        .collect()
}
