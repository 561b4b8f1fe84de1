//! Application tables every database starts with.
//!
//! Projects own canvas elements, which own key/value properties. The tables
//! are declared as [`TableSpec`]s and go through the same coordinator as
//! client-defined tables.

use oxide_schema_core::{Catalog, ColumnSpec, TableSpec};
use tracing::{debug, info};

use crate::coordinator::SchemaCoordinator;
use crate::error::Result;

/// Id of the project elements belong to when none is given.
pub const DEFAULT_PROJECT_ID: i64 = 1;
/// Name of the seeded default project.
pub const DEFAULT_PROJECT_NAME: &str = "Default Project";
/// Description of the seeded default project.
pub const DEFAULT_PROJECT_DESCRIPTION: &str = "Automatically created default project";

fn id() -> ColumnSpec {
    ColumnSpec::new("id", "INTEGER").not_null().primary_key()
}

fn timestamp(name: &str) -> ColumnSpec {
    ColumnSpec::new(name, "DATETIME").default_value("CURRENT_TIMESTAMP")
}

/// The built-in tables, parents before children.
#[must_use]
pub fn builtin_tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new("projects")
            .column(id())
            .column(ColumnSpec::new("name", "VARCHAR").default_value(DEFAULT_PROJECT_NAME))
            .column(ColumnSpec::new("description", "VARCHAR"))
            .column(timestamp("created_at"))
            .column(timestamp("updated_at")),
        TableSpec::new("canvas_elements")
            .column(id())
            .column(
                ColumnSpec::new("project_id", "INTEGER")
                    .default_value(DEFAULT_PROJECT_ID.to_string())
                    .references("projects", "id"),
            )
            .column(ColumnSpec::new("element_id", "VARCHAR"))
            .column(ColumnSpec::new("element_type", "VARCHAR"))
            .column(ColumnSpec::new("x", "INTEGER").default_value("0"))
            .column(ColumnSpec::new("y", "INTEGER").default_value("0"))
            .column(timestamp("created_at"))
            .column(timestamp("updated_at")),
        TableSpec::new("element_properties")
            .column(id())
            .column(ColumnSpec::new("element_id", "INTEGER").references("canvas_elements", "id"))
            .column(ColumnSpec::new("key", "VARCHAR"))
            .column(ColumnSpec::new("value", "TEXT"))
            .column(timestamp("created_at"))
            .column(timestamp("updated_at")),
    ]
}

/// Creates whichever built-in tables are missing and makes sure the default
/// project exists. Returns the names of the tables created.
pub async fn ensure_builtin_tables(coordinator: &SchemaCoordinator) -> Result<Vec<String>> {
    let existing = coordinator.get_schema().await?;
    let mut created = Vec::new();

    for spec in builtin_tables() {
        let name = spec.require_name()?;
        if existing.contains_table(name.as_str()) {
            debug!(table = %name.as_str(), "Built-in table already present");
            continue;
        }
        let schema = coordinator.create_table(&spec).await?;
        created.push(schema.name);
    }

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO projects (id, name, description) VALUES (?1, ?2, ?3)",
    )
    .bind(DEFAULT_PROJECT_ID)
    .bind(DEFAULT_PROJECT_NAME)
    .bind(DEFAULT_PROJECT_DESCRIPTION)
    .execute(coordinator.pool())
    .await?
    .rows_affected();

    if inserted > 0 {
        info!(id = DEFAULT_PROJECT_ID, "Created default project");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    #[tokio::test]
    async fn test_ensure_builtin_tables_is_idempotent() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);

        let created = ensure_builtin_tables(&coordinator).await.unwrap();
        assert_eq!(created, vec!["projects", "canvas_elements", "element_properties"]);

        let created = ensure_builtin_tables(&coordinator).await.unwrap();
        assert!(created.is_empty());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(coordinator.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_builtin_foreign_keys() {
        let coordinator = SchemaCoordinator::new(create_test_pool().await);
        ensure_builtin_tables(&coordinator).await.unwrap();

        let schema = coordinator.get_schema().await.unwrap();
        let elements = schema.lookup("canvas_elements").unwrap();
        assert_eq!(elements.foreign_keys.len(), 1);
        assert_eq!(elements.foreign_keys[0].referred_table, "projects");
        assert_eq!(
            elements.column("project_id").unwrap().default.as_deref(),
            Some("1")
        );

        // Elements default to the seeded project.
        sqlx::query("INSERT INTO canvas_elements (element_id, element_type) VALUES ('b1', 'button')")
            .execute(coordinator.pool())
            .await
            .unwrap();
    }
}
