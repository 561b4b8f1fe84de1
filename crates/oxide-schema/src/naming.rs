//! Temporary table names for rebuilds.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Process-wide sequence, so two rebuilds within the same millisecond still
/// get distinct names.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh temporary name derived from `table`:
/// `<table>__rebuild_<unix-millis>_<sequence>`.
///
/// The name is not checked against the catalog here; the planner treats a
/// collision as fatal.
#[must_use]
pub fn temp_table_name(table: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{table}__rebuild_{millis}_{sequence}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_names_are_distinct() {
        let first = temp_table_name("users");
        let second = temp_table_name("users");
        assert_ne!(first, second);
        assert!(first.starts_with("users__rebuild_"));
    }
}
