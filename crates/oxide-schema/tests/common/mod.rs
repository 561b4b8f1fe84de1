#![allow(dead_code)]

use oxide_schema::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

pub async fn coordinator() -> SchemaCoordinator {
    SchemaCoordinator::new(create_test_pool().await)
}

/// Runs raw SQL outside the coordinator, for seeding rows.
pub async fn exec(coordinator: &SchemaCoordinator, sql: &str) {
    sqlx::query(sql)
        .execute(coordinator.pool())
        .await
        .unwrap_or_else(|e| panic!("Failed to run: {sql}\nError: {e}"));
}

pub async fn count(coordinator: &SchemaCoordinator, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(coordinator.pool())
        .await
        .unwrap_or_else(|e| panic!("Failed to count {table}: {e}"));
    n
}

pub async fn table_names(coordinator: &SchemaCoordinator) -> Vec<String> {
    coordinator
        .get_schema()
        .await
        .expect("Failed to read schema")
        .table_names()
        .map(str::to_string)
        .collect()
}

pub fn column_names(schema: &LiveTableSchema) -> Vec<&str> {
    schema.column_names().collect()
}

pub fn schema_error(err: &Error) -> &SchemaError {
    err.schema()
        .unwrap_or_else(|| panic!("Expected a schema error, got {err:?}"))
}

/// `{a:int, b:text, c:int}`
pub fn abc_spec() -> TableSpec {
    TableSpec::new("t")
        .column(ColumnSpec::new("a", "INTEGER"))
        .column(ColumnSpec::new("b", "TEXT"))
        .column(ColumnSpec::new("c", "INTEGER"))
}
