//! Schema transaction coordinator.
//!
//! Owns the connection and transaction for one schema mutation. Statements
//! run strictly in order; the first failure rolls the whole transaction back,
//! so callers never observe a half-applied change.

use std::collections::BTreeSet;

use oxide_schema_core::{
    Catalog, DatabaseSchema, Ident, LiveTableSchema, MigrationPhase, SchemaError,
    SchemaStatement, TableSpec, compile_create, compile_update, unresolved_references,
};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Connection, Row, Sqlite, Transaction};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::introspect;
use crate::naming::temp_table_name;

/// Runs create and update requests against a SQLite pool.
#[derive(Debug, Clone)]
pub struct SchemaCoordinator {
    pool: SqlitePool,
}

impl SchemaCoordinator {
    /// Creates a coordinator over `pool`.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reads the schema of every user table.
    pub async fn get_schema(&self) -> Result<DatabaseSchema> {
        let mut conn = self.pool.acquire().await?;
        introspect::database_schema(&mut conn).await
    }

    /// Reads the schema of one table.
    pub async fn table_schema(&self, table: &str) -> Result<LiveTableSchema> {
        let mut conn = self.pool.acquire().await?;
        introspect::table_schema(&mut conn, table).await
    }

    /// Creates a table from `spec` and returns its schema as stored.
    pub async fn create_table(&self, spec: &TableSpec) -> Result<LiveTableSchema> {
        let table = spec.require_name()?;
        spec.validate_columns(table.as_str())?;

        info!(
            table = %table.as_str(),
            columns = spec.columns.len(),
            "Creating table"
        );

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let outcome = create_in(&mut tx, &table, spec).await;
        let schema = finish(tx, outcome, MigrationPhase::Building).await?;

        info!(table = %schema.name, "Table created");
        Ok(schema)
    }

    /// Rebuilds `current` into the shape of `spec` (copy, drop, rename) and
    /// returns the resulting schema. A name in `spec` renames the table.
    pub async fn update_table(&self, current: &str, spec: &TableSpec) -> Result<LiveTableSchema> {
        spec.final_name()?;
        spec.validate_columns(current)?;

        info!(
            table = %current,
            new_name = ?spec.name,
            columns = spec.columns.len(),
            "Rebuilding table"
        );

        let mut conn = self.pool.acquire().await?;

        // The pragma is ignored inside a transaction, so it is switched on the
        // held connection around the whole rebuild and restored afterwards.
        let enforced = foreign_keys_enabled(&mut conn).await?;
        if enforced {
            set_foreign_keys(&mut conn, false).await?;
        }

        let outcome = rebuild(&mut conn, current, spec).await;

        if enforced {
            if let Err(err) = set_foreign_keys(&mut conn, true).await {
                warn!(error = %err, "Failed to re-enable foreign keys, discarding connection");
                drop(conn.detach());
            }
        }

        let schema = outcome?;
        info!(table = %schema.name, "Table rebuilt");
        Ok(schema)
    }

    /// Runs already-built statements in one transaction and returns the
    /// schema of `target` afterwards.
    pub async fn execute(
        &self,
        statements: &[SchemaStatement],
        target: &str,
    ) -> Result<LiveTableSchema> {
        let last_phase = statements
            .last()
            .map_or(MigrationPhase::Building, SchemaStatement::phase);

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let outcome = execute_in(&mut tx, statements, target).await;
        finish(tx, outcome, last_phase).await
    }

    /// Returns the SQL `create_table` would run, without running it.
    pub async fn preview_create(&self, spec: &TableSpec) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let outcome = preview_create_in(&mut tx, spec).await;
        tx.rollback().await?;
        outcome
    }

    /// Returns the SQL `update_table` would run, without running it.
    pub async fn preview_update(&self, current: &str, spec: &TableSpec) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let outcome = preview_update_in(&mut tx, current, spec).await;
        tx.rollback().await?;
        outcome
    }
}

async fn preview_create_in(conn: &mut SqliteConnection, spec: &TableSpec) -> Result<Vec<String>> {
    let catalog = introspect::database_schema(conn).await?;
    let statement = compile_create(&catalog, spec)?;
    Ok(vec![statement.to_sql()])
}

async fn preview_update_in(
    conn: &mut SqliteConnection,
    current: &str,
    spec: &TableSpec,
) -> Result<Vec<String>> {
    let catalog = introspect::database_schema(conn).await?;
    let plan = compile_update(&catalog, current, spec, &temp_table_name(current))?;
    Ok(plan.sql())
}

async fn create_in(
    conn: &mut SqliteConnection,
    table: &Ident,
    spec: &TableSpec,
) -> Result<LiveTableSchema> {
    let catalog = introspect::database_schema(conn).await?;
    let statement = compile_create(&catalog, spec)?;
    verify_references(&catalog, &statement, &[table])?;

    run(conn, std::slice::from_ref(&statement)).await?;
    introspect::table_schema(conn, table.as_str()).await
}

async fn rebuild(
    conn: &mut SqliteConnection,
    current: &str,
    spec: &TableSpec,
) -> Result<LiveTableSchema> {
    let mut tx = conn.begin().await?;
    let outcome = rebuild_in(&mut tx, current, spec).await;
    finish(tx, outcome, MigrationPhase::Swapped).await
}

async fn rebuild_in(
    conn: &mut SqliteConnection,
    current: &str,
    spec: &TableSpec,
) -> Result<LiveTableSchema> {
    let catalog = introspect::database_schema(conn).await?;
    let plan = compile_update(&catalog, current, spec, &temp_table_name(current))?;
    verify_references(&catalog, &plan.statements[0], &plan.aliases())?;

    debug!(
        source = %plan.source.as_str(),
        temp = %plan.temp.as_str(),
        target = %plan.target.as_str(),
        copied = plan.copied_columns.len(),
        "Planned rebuild"
    );
    if plan.copied_columns.is_empty() {
        warn!(table = %plan.source.as_str(), "No columns in common, table is rebuilt empty");
    }

    run(conn, &plan.statements).await?;
    check_foreign_keys(conn, &plan.target).await?;
    introspect::table_schema(conn, plan.target.as_str()).await
}

async fn execute_in(
    conn: &mut SqliteConnection,
    statements: &[SchemaStatement],
    target: &str,
) -> Result<LiveTableSchema> {
    run(conn, statements).await?;
    introspect::table_schema(conn, target).await
}

/// Executes statements in order, stopping at the first failure.
async fn run(conn: &mut SqliteConnection, statements: &[SchemaStatement]) -> Result<()> {
    let mut current: Option<MigrationPhase> = None;

    for (step, statement) in statements.iter().enumerate() {
        let phase = statement.phase();
        debug_assert!(current.is_none_or(|c| c <= phase), "phases only move forward");
        if current != Some(phase) {
            debug!(%phase, "Entering phase");
            current = Some(phase);
        }

        let sql = statement.to_sql();
        debug!(step, sql = %sql, "Executing SQL");

        if let Err(err) = sqlx::query(&sql).execute(&mut *conn).await {
            warn!(%phase, step, error = %err, "Schema statement failed, rolling back");
            return Err(SchemaError::mutation_failed(phase, err).into());
        }
    }

    Ok(())
}

/// Commits on success, rolls back on failure. Either way the transaction is
/// consumed here.
async fn finish<T>(
    tx: Transaction<'_, Sqlite>,
    outcome: Result<T>,
    phase: MigrationPhase,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|err| SchemaError::mutation_failed(phase, err))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn verify_references(
    catalog: &impl Catalog,
    statement: &SchemaStatement,
    aliases: &[&Ident],
) -> Result<()> {
    let problems = unresolved_references(catalog, statement, aliases);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::mutation_failed(MigrationPhase::Building, problems.join("; ")).into())
    }
}

/// Checks the foreign keys a rebuild can break: those declared on `target`
/// and those of every table pointing at it. Rows elsewhere are left alone.
async fn check_foreign_keys(conn: &mut SqliteConnection, target: &Ident) -> Result<()> {
    let schema = introspect::database_schema(conn).await?;
    let mut tables: BTreeSet<&str> = schema
        .referencing(target.as_str())
        .map(|t| t.name.as_str())
        .collect();
    tables.insert(
        schema
            .lookup(target.as_str())
            .map_or(target.as_str(), |t| t.name.as_str()),
    );

    for table in tables {
        let sql = format!("PRAGMA foreign_key_check({})", Ident::new(table)?.quoted());
        let violations = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| SchemaError::mutation_failed(MigrationPhase::Swapped, err))?;

        if let Some(row) = violations.first() {
            let parent: String = row.try_get("parent")?;
            return Err(SchemaError::mutation_failed(
                MigrationPhase::Swapped,
                format!(
                    "{} row(s) violate foreign keys, first in '{table}' referencing '{parent}'",
                    violations.len()
                ),
            )
            .into());
        }
    }

    Ok(())
}

async fn foreign_keys_enabled(conn: &mut SqliteConnection) -> Result<bool> {
    let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
        .fetch_one(&mut *conn)
        .await?;
    Ok(enabled != 0)
}

async fn set_foreign_keys(conn: &mut SqliteConnection, enabled: bool) -> Result<()> {
    let sql = if enabled {
        "PRAGMA foreign_keys = ON"
    } else {
        "PRAGMA foreign_keys = OFF"
    };
    sqlx::query(sql).execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_schema_core::ColumnSpec;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn projects_spec() -> TableSpec {
        TableSpec::new("projects")
            .column(ColumnSpec::new("id", "INTEGER").not_null().primary_key())
            .column(ColumnSpec::new("name", "VARCHAR").default_value("Default Project"))
    }

    #[tokio::test]
    async fn test_create_table() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        let schema = coordinator.create_table(&projects_spec()).await.unwrap();

        assert_eq!(schema.name, "projects");
        assert_eq!(
            schema.column_names().collect::<Vec<_>>(),
            vec!["id", "name"]
        );
        assert_eq!(
            schema.column("name").unwrap().default.as_deref(),
            Some("'Default Project'")
        );
    }

    #[tokio::test]
    async fn test_create_table_with_missing_reference_is_rolled_back() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        let spec = TableSpec::new("elements")
            .column(ColumnSpec::new("id", "INTEGER").primary_key())
            .column(ColumnSpec::new("project_id", "INTEGER").references("projects", "id"));

        let err = coordinator.create_table(&spec).await.unwrap_err();
        assert!(matches!(
            err.schema(),
            Some(SchemaError::SchemaMutationFailed {
                phase: MigrationPhase::Building,
                ..
            })
        ));
        assert!(coordinator.get_schema().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_restores_foreign_key_enforcement() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        coordinator.create_table(&projects_spec()).await.unwrap();

        let spec = TableSpec::unnamed()
            .column(ColumnSpec::new("id", "INTEGER").not_null().primary_key())
            .column(ColumnSpec::new("title", "TEXT"));
        coordinator.update_table("projects", &spec).await.unwrap();

        let mut conn = coordinator.pool().acquire().await.unwrap();
        assert!(foreign_keys_enabled(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_rejects_orphaning_children() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        coordinator.create_table(&projects_spec()).await.unwrap();
        coordinator
            .create_table(
                &TableSpec::new("elements")
                    .column(ColumnSpec::new("id", "INTEGER").primary_key())
                    .column(ColumnSpec::new("project_id", "INTEGER").references("projects", "id")),
            )
            .await
            .unwrap();
        sqlx::query("INSERT INTO projects (id) VALUES (1)")
            .execute(coordinator.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO elements (id, project_id) VALUES (1, 1)")
            .execute(coordinator.pool())
            .await
            .unwrap();

        // Dropping the key column leaves the child's reference dangling.
        let spec = TableSpec::unnamed().column(ColumnSpec::new("name", "TEXT"));
        let err = coordinator.update_table("projects", &spec).await.unwrap_err();
        assert!(matches!(
            err.schema(),
            Some(SchemaError::SchemaMutationFailed {
                phase: MigrationPhase::Swapped,
                ..
            })
        ));

        let projects = coordinator.table_schema("projects").await.unwrap();
        assert_eq!(projects.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_preview_does_not_execute() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        let sql = coordinator.preview_create(&projects_spec()).await.unwrap();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("CREATE TABLE \"projects\""));
        assert!(coordinator.get_schema().await.unwrap().is_empty());

        coordinator.create_table(&projects_spec()).await.unwrap();
        let spec = TableSpec::new("renamed").column(ColumnSpec::new("id", "INTEGER"));
        let sql = coordinator.preview_update("projects", &spec).await.unwrap();
        assert_eq!(sql.len(), 5);
        assert!(coordinator.table_schema("projects").await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_reports_failing_phase() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        coordinator.create_table(&projects_spec()).await.unwrap();

        let statements = vec![SchemaStatement::DropTable {
            table: Ident::new("missing").unwrap(),
        }];
        let err = coordinator.execute(&statements, "projects").await.unwrap_err();
        assert!(matches!(
            err.schema(),
            Some(SchemaError::SchemaMutationFailed {
                phase: MigrationPhase::Swapped,
                ..
            })
        ));
    }
}
