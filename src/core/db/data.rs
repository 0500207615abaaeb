/// Result Data Module
///
/// In-memory result sets: single records, tables of records sharing a
/// column list, and data sets made of named tables.
use crate::core::{DalError, FromValue, Result, Value};
use std::sync::Arc;

/// Name given to unnamed tables when a data set is filled
pub const DEFAULT_TABLE_NAME: &str = "Table";

/// One row of a result set
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl DataRecord {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        DataRecord { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column, compared case-insensitively
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.ordinal(name).and_then(|i| self.values.get(i))
    }

    /// Typed value at `index`
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.value(index).ok_or_else(|| {
            DalError::Query(format!(
                "Column index {} out of range ({} columns)",
                index,
                self.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Typed value of the column called `name`
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .value_by_name(name)
            .ok_or_else(|| DalError::Query(format!("No column named '{}'", name)))?;
        T::from_value(value)
    }
}

/// A named table of records
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub name: String,
    columns: Arc<[String]>,
    rows: Vec<DataRecord>,
}

impl Default for DataTable {
    fn default() -> Self {
        DataTable::new(String::new(), Vec::new())
    }
}

impl DataTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        DataTable {
            name: name.into(),
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from records that share `columns`
    pub fn from_records(
        name: impl Into<String>,
        columns: Arc<[String]>,
        rows: Vec<DataRecord>,
    ) -> Self {
        DataTable {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    pub fn rows(&self) -> &[DataRecord] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Appends a row; its length must match the column count
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DalError::Query(format!(
                "Row has {} values but table '{}' has {} columns",
                values.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows
            .push(DataRecord::new(Arc::clone(&self.columns), values));
        Ok(())
    }
}

/// An ordered collection of named tables
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    tables: Vec<DataTable>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn first(&self) -> Option<&DataTable> {
        self.tables.first()
    }

    pub fn table(&self, name: &str) -> Option<&DataTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Removes and returns the first table
    pub fn take_first(&mut self) -> Option<DataTable> {
        if self.tables.is_empty() {
            None
        } else {
            Some(self.tables.remove(0))
        }
    }

    pub fn push(&mut self, table: DataTable) {
        self.tables.push(table);
    }

    /// Adds `table`, appending its rows to an existing table of the same
    /// name and shape, or replacing a same-named table of a different shape.
    pub fn merge(&mut self, table: DataTable) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) if existing.columns == table.columns => {
                existing.rows.extend(table.rows);
            }
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Names result tables `base`, `base1`, `base2`, ...
    pub fn name_tables(&mut self, base: &str) {
        for (i, table) in self.tables.iter_mut().enumerate() {
            table.name = if i == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, i)
            };
        }
    }
}
