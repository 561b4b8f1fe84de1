//! SQLite catalog introspection.
//!
//! Every function takes the connection (or open transaction) it reads
//! through, so a mutation always sees the catalog as of its own transaction.
//! Results are never cached.

use std::collections::{BTreeMap, BTreeSet};

use oxide_schema_core::{DatabaseSchema, LiveColumn, LiveForeignKey, LiveTableSchema, SchemaError};
use sqlx::{Row, SqliteConnection};

use crate::error::{Error, Result};

/// User tables only; `sqlite_*` tables belong to the engine.
const LIST_TABLES_SQL: &str = r"
SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY name
";

const CANONICAL_NAME_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";

const TABLE_INFO_SQL: &str = r#"
SELECT name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid
"#;

const FOREIGN_KEY_LIST_SQL: &str = r#"
SELECT id, seq, "table", "from", "to"
FROM pragma_foreign_key_list(?1)
ORDER BY id, seq
"#;

/// Returns the names of all user tables.
pub async fn list_tables(conn: &mut SqliteConnection) -> Result<BTreeSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Returns the columns of `table` in physical order.
///
/// Fails with [`SchemaError::TableNotFound`] if the table does not exist.
pub async fn get_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<LiveColumn>> {
    let rows = sqlx::query(TABLE_INFO_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    // A table always has at least one column.
    if rows.is_empty() {
        return Err(SchemaError::TableNotFound(table.to_string()).into());
    }

    rows.iter()
        .map(|row| {
            let not_null: i64 = row.try_get("notnull")?;
            let pk_position: i64 = row.try_get("pk")?;
            Ok(LiveColumn {
                name: row.try_get("name")?,
                sql_type: row.try_get("type")?,
                nullable: not_null == 0,
                default: row.try_get("dflt_value")?,
                primary_key: pk_position > 0,
            })
        })
        .collect()
}

/// Returns the foreign-key constraints declared on `table`.
///
/// A reference written without a column list (`REFERENCES parent`) points at
/// the parent's primary key, which is resolved here.
pub async fn get_foreign_keys(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<LiveForeignKey>> {
    let rows = sqlx::query(FOREIGN_KEY_LIST_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    let mut by_id: BTreeMap<i64, (LiveForeignKey, bool)> = BTreeMap::new();
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let referred_table: String = row.try_get("table")?;
        let from: String = row.try_get("from")?;
        let to: Option<String> = row.try_get("to")?;

        let (fk, implicit) = by_id.entry(id).or_insert_with(|| {
            (
                LiveForeignKey {
                    constrained_columns: Vec::new(),
                    referred_table,
                    referred_columns: Vec::new(),
                },
                false,
            )
        });
        fk.constrained_columns.push(from);
        match to {
            Some(to) => fk.referred_columns.push(to),
            None => *implicit = true,
        }
    }

    let mut foreign_keys = Vec::with_capacity(by_id.len());
    for (_, (mut fk, implicit)) in by_id {
        if implicit {
            // A reference to a missing parent has no key columns to report.
            fk.referred_columns = match get_columns(conn, &fk.referred_table).await {
                Ok(columns) => columns
                    .into_iter()
                    .filter(|c| c.primary_key)
                    .map(|c| c.name)
                    .collect(),
                Err(Error::Schema(SchemaError::TableNotFound(_))) => Vec::new(),
                Err(err) => return Err(err),
            };
        }
        foreign_keys.push(fk);
    }

    Ok(foreign_keys)
}

/// Reads the full live schema of one table.
pub async fn table_schema(conn: &mut SqliteConnection, table: &str) -> Result<LiveTableSchema> {
    let name: Option<(String,)> = sqlx::query_as(CANONICAL_NAME_SQL)
        .bind(table)
        .fetch_optional(&mut *conn)
        .await?;
    let Some((name,)) = name else {
        return Err(SchemaError::TableNotFound(table.to_string()).into());
    };

    let columns = get_columns(conn, &name).await?;
    let foreign_keys = get_foreign_keys(conn, &name).await?;
    Ok(LiveTableSchema {
        name,
        columns,
        foreign_keys,
    })
}

/// Reads every user table.
pub async fn database_schema(conn: &mut SqliteConnection) -> Result<DatabaseSchema> {
    let mut schema = DatabaseSchema::new();
    for name in list_tables(conn).await? {
        schema.insert(table_schema(conn, &name).await?);
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    async fn connect() -> SqliteConnection {
        let mut conn = SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite connection");
        sqlx::query(
            r#"
            CREATE TABLE parents (id INTEGER PRIMARY KEY, code TEXT NOT NULL DEFAULT 'x');
            CREATE TABLE children (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER REFERENCES parents(id),
                alt_parent INTEGER,
                FOREIGN KEY (alt_parent) REFERENCES parents
            );
            "#,
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_list_tables() {
        let mut conn = connect().await;
        let tables = list_tables(&mut conn).await.unwrap();
        assert_eq!(
            tables.into_iter().collect::<Vec<_>>(),
            vec!["children".to_string(), "parents".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_columns() {
        let mut conn = connect().await;
        let columns = get_columns(&mut conn, "parents").await.unwrap();
        assert_eq!(columns.len(), 2);

        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].sql_type, "INTEGER");
        assert!(columns[0].primary_key);

        assert_eq!(columns[1].name, "code");
        assert!(!columns[1].nullable);
        assert_eq!(columns[1].default.as_deref(), Some("'x'"));
        assert!(!columns[1].primary_key);
    }

    #[tokio::test]
    async fn test_get_columns_missing_table() {
        let mut conn = connect().await;
        let err = get_columns(&mut conn, "nope").await.unwrap_err();
        assert!(matches!(err.schema(), Some(SchemaError::TableNotFound(t)) if t == "nope"));
    }

    #[tokio::test]
    async fn test_get_foreign_keys() {
        let mut conn = connect().await;
        let fks = get_foreign_keys(&mut conn, "children").await.unwrap();
        assert_eq!(fks.len(), 2);
        for fk in &fks {
            assert_eq!(fk.referred_table, "parents");
            assert_eq!(fk.referred_columns, vec!["id".to_string()]);
        }
        let constrained: BTreeSet<&str> = fks
            .iter()
            .map(|fk| fk.constrained_columns[0].as_str())
            .collect();
        assert!(constrained.contains("parent_id"));
        assert!(constrained.contains("alt_parent"));
    }

    #[tokio::test]
    async fn test_implicit_reference_to_missing_parent() {
        let mut conn = connect().await;
        sqlx::query("CREATE TABLE orphans (id INTEGER, ghost_id INTEGER REFERENCES ghosts)")
            .execute(&mut conn)
            .await
            .unwrap();

        let fks = get_foreign_keys(&mut conn, "orphans").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referred_table, "ghosts");
        assert!(fks[0].referred_columns.is_empty());
    }

    #[tokio::test]
    async fn test_table_schema_uses_catalog_spelling() {
        let mut conn = connect().await;
        let schema = table_schema(&mut conn, "PARENTS").await.unwrap();
        assert_eq!(schema.name, "parents");
        assert!(schema.foreign_keys.is_empty());

        let all = database_schema(&mut conn).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
