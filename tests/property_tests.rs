//! Property-based tests for the report ordering and connection accounting
//!
//! These tests verify that:
//! - The table report is always ordered by row count, largest first
//! - Sorting is deterministic regardless of input order
//! - Opening and disposing managers in any order leaves no connection counted

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;
    use tablescope::catalog::{sort_by_records_desc, TableInfo};
    use tablescope::core::db::{CommandOptions, ConnectionRegistry, DataSet, DataTable, SqliteManager};

    fn arb_table_info() -> impl Strategy<Value = TableInfo> {
        ("[a-z][a-z0-9_]{0,11}", 0i64..1000).prop_map(|(name, records)| TableInfo { name, records })
    }

    proptest! {
        #[test]
        fn prop_report_sorted_descending(mut infos in prop::collection::vec(arb_table_info(), 0..40)) {
            sort_by_records_desc(&mut infos);
            for pair in infos.windows(2) {
                prop_assert!(pair[0].records >= pair[1].records);
                if pair[0].records == pair[1].records {
                    prop_assert!(pair[0].name <= pair[1].name);
                }
            }
        }

        #[test]
        fn prop_sort_ignores_input_order(infos in prop::collection::vec(arb_table_info(), 0..20)) {
            let mut forward = infos.clone();
            let mut reversed: Vec<TableInfo> = infos.into_iter().rev().collect();
            sort_by_records_desc(&mut forward);
            sort_by_records_desc(&mut reversed);
            prop_assert_eq!(forward, reversed);
        }

        #[test]
        fn prop_table_names_follow_base(count in 1usize..8, base in "[A-Z][a-z]{0,8}") {
            let mut data_set = DataSet::new();
            for _ in 0..count {
                data_set.push(DataTable::default());
            }
            data_set.name_tables(&base);
            prop_assert_eq!(&data_set.tables()[0].name, &base);
            for (i, table) in data_set.tables().iter().enumerate().skip(1) {
                prop_assert_eq!(&table.name, &format!("{}{}", base, i));
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_connections_released_once(
            dispose_twice in prop::collection::vec(any::<bool>(), 1..6),
            keep_open in any::<bool>(),
        ) {
            let registry = Arc::new(ConnectionRegistry::new());
            let mut managers: Vec<SqliteManager> = dispose_twice
                .iter()
                .map(|_| SqliteManager::connect_with_registry(":memory:", true, Arc::clone(&registry)).unwrap())
                .collect();
            prop_assert_eq!(registry.active_connections(), managers.len());

            let options = if keep_open { CommandOptions::text().keep_open() } else { CommandOptions::text() };
            for (manager, twice) in managers.iter_mut().zip(&dispose_twice) {
                let one: i64 = manager.execute_scalar("SELECT 1", options).unwrap();
                prop_assert_eq!(one, 1);
                manager.dispose();
                if *twice {
                    manager.dispose();
                }
            }
            prop_assert_eq!(registry.active_connections(), 0);
            drop(managers);
            prop_assert_eq!(registry.active_connections(), 0);
        }
    }
}
