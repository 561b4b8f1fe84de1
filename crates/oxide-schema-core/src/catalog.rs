//! Introspected table state.
//!
//! Driver crates read the engine's catalog into these types. They are
//! derived on demand inside a mutation and dropped with it; nothing here is
//! meant to outlive one operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Declared type, as stored by the engine.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value text, if any.
    pub default: Option<String>,
    /// Whether this column belongs to the primary key.
    pub primary_key: bool,
}

/// A foreign-key constraint as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveForeignKey {
    /// Columns of the owning table.
    pub constrained_columns: Vec<String>,
    /// Referenced table.
    pub referred_table: String,
    /// Referenced columns, pairwise with `constrained_columns`.
    pub referred_columns: Vec<String>,
}

/// The live schema of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTableSchema {
    /// Table name.
    pub name: String,
    /// Columns in physical order.
    pub columns: Vec<LiveColumn>,
    /// Foreign-key constraints.
    pub foreign_keys: Vec<LiveForeignKey>,
}

impl LiveTableSchema {
    /// Looks up a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column the way SQLite resolves column names.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Every user table, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseSchema {
    tables: BTreeMap<String, LiveTableSchema>,
}

impl DatabaseSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table.
    #[must_use]
    pub fn table(mut self, table: LiveTableSchema) -> Self {
        self.insert(table);
        self
    }

    /// Adds (or replaces) a table in place.
    pub fn insert(&mut self, table: LiveTableSchema) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Returns the tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &LiveTableSchema> {
        self.tables.values()
    }

    /// Returns the table names in order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns the tables with a foreign key pointing at `table`, matched
    /// case-insensitively. A self-referencing table is included.
    pub fn referencing<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a LiveTableSchema> {
        self.tables.values().filter(move |t| {
            t.foreign_keys
                .iter()
                .any(|fk| fk.referred_table.eq_ignore_ascii_case(table))
        })
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Read access to a catalog snapshot.
///
/// The compiler and planner only see the catalog through this trait, so they
/// stay independent of any driver. Lookups follow SQLite's ASCII
/// case-insensitive table-name resolution.
pub trait Catalog {
    /// Finds a table by name.
    fn lookup(&self, name: &str) -> Option<&LiveTableSchema>;

    /// Whether a table with this name exists.
    fn contains_table(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl Catalog for DatabaseSchema {
    fn lookup(&self, name: &str) -> Option<&LiveTableSchema> {
        self.tables.get(name).or_else(|| {
            self.tables
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> LiveTableSchema {
        LiveTableSchema {
            name: "Users".into(),
            columns: vec![LiveColumn {
                name: "id".into(),
                sql_type: "INTEGER".into(),
                nullable: false,
                default: None,
                primary_key: true,
            }],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = DatabaseSchema::new().table(users());
        assert!(schema.contains_table("Users"));
        assert!(schema.contains_table("users"));
        assert!(!schema.contains_table("user"));
        assert_eq!(schema.lookup("USERS").unwrap().name, "Users");
    }

    #[test]
    fn test_referencing_tables() {
        let posts = LiveTableSchema {
            name: "posts".into(),
            columns: vec![],
            foreign_keys: vec![LiveForeignKey {
                constrained_columns: vec!["author".into()],
                referred_table: "users".into(),
                referred_columns: vec!["id".into()],
            }],
        };
        let tags = LiveTableSchema {
            name: "tags".into(),
            columns: vec![],
            foreign_keys: vec![],
        };
        let schema = DatabaseSchema::new().table(users()).table(posts).table(tags);

        let names: Vec<&str> = schema.referencing("Users").map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["posts"]);
        assert_eq!(schema.referencing("tags").count(), 0);
    }

    #[test]
    fn test_serializes_as_mapping() {
        let schema = DatabaseSchema::new().table(users());
        let json = serde_json::to_value(&schema).unwrap();
        let column = &json["Users"]["columns"][0];
        assert_eq!(column["type"], "INTEGER");
        assert_eq!(column["primaryKey"], true);
        assert_eq!(json["Users"]["foreignKeys"], serde_json::json!([]));
    }
}
