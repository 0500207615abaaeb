/// Catalog Module
///
/// Canned reporting queries over a database: the user tables and how many
/// rows each holds. Every query runs through a `SqliteManager` with errors
/// propagated, so callers see why a report could not be built.
use crate::core::db::{
    CommandOptions, ConnectionRegistry, DataTable, SqliteManager, DEFAULT_COMMAND_TIMEOUT,
    PROCEDURES_TABLE,
};
use crate::core::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A table and its row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub records: i64,
}

/// Reporting helper bound to one connection string
///
/// Every query propagates its error: an unreachable database or a missing
/// table is reported as `Err`, never as a count of 0.
#[derive(Debug, Clone)]
pub struct DbInfo {
    connection_string: String,
    command_timeout: u32,
    registry: Arc<ConnectionRegistry>,
}

impl DbInfo {
    pub fn new(connection_string: impl Into<String>) -> Self {
        DbInfo {
            connection_string: connection_string.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            registry: ConnectionRegistry::global(),
        }
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.command_timeout = seconds;
        self
    }

    /// Counts connections in `registry` instead of the global one
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Number of user tables
    pub fn tables_count(&self) -> Result<i64> {
        let sql = format!("SELECT count(*) FROM sqlite_master WHERE {}", user_tables_filter());
        self.manager()?.execute_scalar(&sql, self.options())
    }

    /// User table names in a single `name` column
    pub fn tables(&self) -> Result<DataTable> {
        self.manager()?.execute_data_table(&tables_sql(), self.options())
    }

    /// Number of rows in `table`
    pub fn records_count(&self, table: &str) -> Result<i64> {
        self.manager()?.execute_scalar(&count_sql(table), self.options())
    }

    /// Every user table with its row count, largest first
    pub fn table_infos(&self) -> Result<Vec<TableInfo>> {
        let mut manager = self.manager()?;
        let options = self.options().keep_open();

        let names = manager
            .execute_enumerable_reader(&tables_sql(), options)?
            .map(|row| row.and_then(|record| record.get::<String>(0)))
            .collect::<Result<Vec<_>>>()?;

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            let records = manager.execute_scalar(&count_sql(&name), options)?;
            infos.push(TableInfo { name, records });
        }
        sort_by_records_desc(&mut infos);
        debug!(tables = infos.len(), "Built table report");
        Ok(infos)
    }

    fn manager(&self) -> Result<SqliteManager> {
        SqliteManager::connect_with_registry(
            self.connection_string.as_str(),
            true,
            Arc::clone(&self.registry),
        )
    }

    fn options(&self) -> CommandOptions {
        CommandOptions::text().timeout(self.command_timeout)
    }
}

/// Orders by row count, largest first; equal counts by name
pub fn sort_by_records_desc(infos: &mut [TableInfo]) {
    infos.sort_by(|a, b| b.records.cmp(&a.records).then_with(|| a.name.cmp(&b.name)));
}

/// Quotes an identifier for use in SQL text
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn user_tables_filter() -> String {
    format!(
        "type = 'table' AND substr(name, 1, 7) <> 'sqlite_' AND name <> '{}'",
        PROCEDURES_TABLE
    )
}

fn tables_sql() -> String {
    format!(
        "SELECT name FROM sqlite_master WHERE {} ORDER BY name",
        user_tables_filter()
    )
}

fn count_sql(table: &str) -> String {
    format!("SELECT count(*) FROM {}", quote_identifier(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DalError;
    use crate::test_utils::SampleDatabase;

    fn info(db: &SampleDatabase) -> (DbInfo, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let info = DbInfo::new(db.connection_string.clone()).with_registry(Arc::clone(&registry));
        (info, registry)
    }

    #[test]
    fn test_tables_count_and_names() {
        let db = SampleDatabase::with_sample_data();
        let (info, registry) = info(&db);

        assert_eq!(info.tables_count().unwrap(), 4);
        let tables = info.tables().unwrap();
        assert_eq!(tables.columns().to_vec(), vec!["name".to_string()]);
        let names: Vec<String> = tables
            .rows()
            .iter()
            .map(|r| r.get::<String>(0).unwrap())
            .collect();
        assert_eq!(names, vec!["categories", "posts", "tags", "users"]);
        assert_eq!(registry.active_connections(), 0);
    }

    #[test]
    fn test_table_infos_sorted_by_records() {
        let db = SampleDatabase::with_sample_data();
        let (info, registry) = info(&db);

        let infos = info.table_infos().unwrap();
        let summary: Vec<(&str, i64)> = infos.iter().map(|t| (t.name.as_str(), t.records)).collect();
        assert_eq!(
            summary,
            vec![("posts", 5), ("users", 3), ("categories", 1), ("tags", 0)]
        );
        assert_eq!(registry.active_connections(), 0);
    }

    #[test]
    fn test_records_count_quotes_identifiers() {
        let db = SampleDatabase::with_sample_data();
        db.execute("CREATE TABLE \"odd \"\"name\"\"\" (x); INSERT INTO \"odd \"\"name\"\"\" VALUES (1), (2);");
        let (info, _) = info(&db);

        assert_eq!(info.records_count("odd \"name\"").unwrap(), 2);
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_procedures_table_is_hidden() {
        let db = SampleDatabase::with_sample_data();
        let (info, registry) = info(&db);
        SqliteManager::connect_with_registry(db.connection_string.clone(), true, registry)
            .unwrap()
            .define_procedure("noop", "SELECT 1")
            .unwrap();

        assert_eq!(info.tables_count().unwrap(), 4);
        assert!(info.table_infos().unwrap().iter().all(|t| t.name != PROCEDURES_TABLE));
    }

    #[test]
    fn test_tables_prefixed_with_sqlite_are_listed() {
        let db = SampleDatabase::empty();
        db.execute(
            "CREATE TABLE sqliteusers (x); INSERT INTO sqliteusers VALUES (1), (2), (3);
             CREATE TABLE SQLite1 (x); INSERT INTO SQLite1 VALUES (1), (2);
             CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, x);
             INSERT INTO orders (x) VALUES (1);",
        );
        let (info, _) = info(&db);

        assert_eq!(info.tables_count().unwrap(), 3);
        let summary: Vec<(String, i64)> = info
            .table_infos()
            .unwrap()
            .into_iter()
            .map(|t| (t.name, t.records))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("sqliteusers".to_string(), 3),
                ("SQLite1".to_string(), 2),
                ("orders".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_missing_table_error_propagates() {
        let db = SampleDatabase::with_sample_data();
        let (info, _) = info(&db);

        match info.records_count("nope") {
            Err(DalError::Database(_)) => {}
            other => panic!("Expected database error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_database_has_no_tables() {
        let db = SampleDatabase::empty();
        let (info, _) = info(&db);
        assert_eq!(info.tables_count().unwrap(), 0);
        assert!(info.table_infos().unwrap().is_empty());
    }
}
