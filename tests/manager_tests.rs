//! Integration tests for the data-access wrapper
//!
//! These cover the lifecycle guarantees of `DbManager`:
//! - disposal is idempotent and releases each connection exactly once
//! - output parameters are only readable after execution
//! - lazy readers yield exactly the result rows, then release the connection
//! - the async variants behave like their blocking counterparts

mod common;

use common::{manager, sample_db};
use tablescope::core::db::{
    CommandOptions, DataSet, Parameter, ParameterDirection, SqliteType,
};
use tablescope::core::{DalError, Value};

#[test]
fn test_double_dispose_is_harmless() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);
    assert_eq!(registry.active_connections(), 1);

    manager.dispose();
    manager.dispose();
    drop(manager);

    assert_eq!(registry.active_connections(), 0);
    assert!(registry.opened_connections().is_empty());
}

#[test]
fn test_output_parameter_before_execution_fails() {
    let db = sample_db();
    let (mut manager, _registry) = manager(&db);

    manager
        .add_output_parameter("@last_id", SqliteType::Integer)
        .unwrap();
    match manager.output_parameter::<i64>("@last_id") {
        Err(DalError::OutputNotAvailable) => {}
        other => panic!("Expected OutputNotAvailable, got {:?}", other),
    }
}

#[test]
fn test_null_output_parameter_returns_default() {
    let db = sample_db();
    let (mut manager, _registry) = manager(&db);

    manager
        .add_output_parameter("@max_label", SqliteType::Text)
        .unwrap()
        .add_output_parameter("@max_id", SqliteType::Integer)
        .unwrap();
    manager
        .execute_non_query(
            "SELECT max(label) AS max_label, max(id) AS max_id FROM audit",
            CommandOptions::text(),
        )
        .unwrap();

    assert_eq!(manager.output_parameter::<String>("@max_label").unwrap(), "");
    assert_eq!(manager.output_parameter::<i64>("@max_id").unwrap(), 0);
}

#[test]
fn test_input_output_parameter_round_trip() {
    let db = sample_db();
    let (mut manager, _registry) = manager(&db);

    manager
        .add_prepared_parameter(
            Parameter::new("@counter", 41)
                .with_direction(ParameterDirection::InputOutput)
                .with_db_type(SqliteType::Integer),
        )
        .unwrap();
    manager
        .execute_non_query("SELECT @counter + 1 AS counter", CommandOptions::text())
        .unwrap();

    assert_eq!(manager.output_parameter::<i64>("@counter").unwrap(), 42);
}

#[test]
fn test_enumerable_reader_yields_rows_then_releases_once() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);

    let labels: Vec<String> = manager
        .execute_enumerable_reader(
            "SELECT label FROM orders ORDER BY id",
            CommandOptions::text(),
        )
        .unwrap()
        .map(|row| row.unwrap().get_by_name::<String>("label").unwrap())
        .collect();

    assert_eq!(labels, vec!["orders-0", "orders-1", "orders-2", "orders-3"]);
    assert_eq!(registry.active_connections(), 0);

    manager.dispose();
    drop(manager);
    assert_eq!(registry.active_connections(), 0);
}

#[test]
fn test_stored_procedure_with_output() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);

    manager
        .define_procedure(
            "add_customer",
            "INSERT INTO customers (label) VALUES (@label) RETURNING id AS new_id",
        )
        .unwrap();
    let affected = manager
        .add_parameter("@label", "customers-new")
        .unwrap()
        .add_output_parameter("@new_id", SqliteType::Integer)
        .unwrap()
        .execute_non_query("add_customer", CommandOptions::procedure())
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(manager.output_parameter::<i64>("@new_id").unwrap(), 3);
    assert_eq!(registry.active_connections(), 0);
}

#[test]
fn test_data_set_tables_follow_naming() {
    let db = sample_db();
    let (mut manager, _registry) = manager(&db);

    let data_set = manager
        .execute_data_set(
            "SELECT * FROM orders; SELECT * FROM customers; SELECT * FROM audit",
            CommandOptions::text(),
        )
        .unwrap();
    let summary: Vec<(&str, usize)> = data_set
        .tables()
        .iter()
        .map(|t| (t.name.as_str(), t.row_count()))
        .collect();
    assert_eq!(summary, vec![("Table", 4), ("Table1", 2), ("Table2", 0)]);

    let mut named = DataSet::new();
    manager
        .execute_data_set_into("SELECT id FROM customers", "Customers", &mut named, CommandOptions::text())
        .unwrap();
    assert_eq!(named.first().unwrap().name, "Customers");
}

#[test]
fn test_typed_parameter_binding() {
    let db = sample_db();
    let (mut manager, _registry) = manager(&db);

    let label: String = manager
        .add_typed_parameter("@id", "2", SqliteType::Integer)
        .unwrap()
        .execute_scalar("SELECT label FROM orders WHERE id = @id", CommandOptions::text())
        .unwrap();
    assert_eq!(label, "orders-1");

    let null: Value = manager
        .execute_scalar("SELECT NULL", CommandOptions::text())
        .unwrap();
    assert_eq!(null, Value::Null);
}

#[tokio::test]
async fn test_async_execution_matches_blocking() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);

    let count: i64 = manager
        .execute_scalar_async("SELECT count(*) FROM orders", CommandOptions::text().keep_open())
        .await
        .unwrap();
    assert_eq!(count, 4);
    assert!(manager.is_open());

    let affected = manager
        .add_parameter("@label", "orders-4")
        .unwrap()
        .execute_non_query_async(
            "INSERT INTO orders (label) VALUES (@label)",
            CommandOptions::text().keep_open(),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let table = manager
        .execute_data_table_async("SELECT * FROM orders", CommandOptions::text())
        .await
        .unwrap();
    assert_eq!(table.row_count(), 5);
    assert_eq!(registry.active_connections(), 0);
}

#[tokio::test]
async fn test_async_readers() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);

    let ids = manager
        .execute_enumerable_reader_async(
            "SELECT id FROM customers ORDER BY id",
            |record| record.get::<i64>(0).unwrap_or_default(),
            CommandOptions::text().keep_open(),
        )
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2]);

    let reader = manager
        .execute_reader_async("SELECT * FROM orders", CommandOptions::text().keep_open())
        .await
        .unwrap();
    assert_eq!(reader.columns().to_vec(), vec!["id".to_string(), "label".to_string()]);
    assert_eq!(reader.count(), 4);
    assert!(manager.is_open());

    let data_set = manager
        .execute_data_set_async("SELECT 1; SELECT 2", CommandOptions::text())
        .await
        .unwrap();
    assert_eq!(data_set.len(), 2);
    assert_eq!(registry.active_connections(), 0);
}

#[tokio::test]
async fn test_async_errors_follow_policy() {
    let db = sample_db();
    let (mut manager, registry) = manager(&db);

    let result = manager
        .execute_non_query_async("DELETE FROM nowhere", CommandOptions::text())
        .await;
    assert!(matches!(result, Err(DalError::Database(_))));
    assert_eq!(registry.active_connections(), 0);

    manager.set_propagate_errors(false);
    let rows = manager
        .execute_data_set_async("SELECT * FROM nowhere", CommandOptions::text())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(registry.active_connections(), 0);
}
