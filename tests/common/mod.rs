//! Shared fixtures for the integration tests

#![allow(dead_code)]

use rusqlite::Connection;
use std::sync::Arc;
use tablescope::core::db::{ConnectionRegistry, SqliteManager};
use tempfile::NamedTempFile;

/// Creates a temporary SQLite database holding `rows[i]` rows in table `names[i]`
pub fn create_temp_db(tables: &[(&str, usize)]) -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let connection = Connection::open(temp_file.path()).unwrap();
    for (name, rows) in tables {
        connection
            .execute_batch(&format!(
                "CREATE TABLE \"{name}\" (id INTEGER PRIMARY KEY, label TEXT);"
            ))
            .unwrap();
        for i in 0..*rows {
            connection
                .execute(
                    &format!("INSERT INTO \"{name}\" (label) VALUES (?1)"),
                    [format!("{name}-{i}")],
                )
                .unwrap();
        }
    }
    temp_file
}

/// Standard fixture: orders (4), customers (2), audit (0)
pub fn sample_db() -> NamedTempFile {
    create_temp_db(&[("orders", 4), ("customers", 2), ("audit", 0)])
}

pub fn connection_string(file: &NamedTempFile) -> String {
    file.path().display().to_string()
}

/// Manager counted in its own registry, errors propagated
pub fn manager(file: &NamedTempFile) -> (SqliteManager, Arc<ConnectionRegistry>) {
    let registry = Arc::new(ConnectionRegistry::new());
    let manager =
        SqliteManager::connect_with_registry(connection_string(file), true, Arc::clone(&registry))
            .unwrap();
    (manager, registry)
}
