/// SQLite Driver Module
///
/// The bundled SQLite binding of the data-access layer.
///
/// SQLite has neither stored procedures nor output parameters, so both are
/// emulated:
///
/// - A stored procedure is a named SQL body kept in the `dal_procedures`
///   table. Running a command of type `StoredProcedure` looks the body up
///   and runs it as a batch.
/// - An output parameter receives the value of the same-named column
///   (sigil stripped) in the first row a statement returns, for example
///   through `RETURNING` or a trailing `SELECT`.
///
/// Connection strings are either a bare path (`app.db`, `:memory:`,
/// `file:app.db?mode=ro`) or `Key=Value` pairs separated by `;` with the
/// keys `Data Source`, `Mode` (`ReadWriteCreate`, `ReadWrite`, `ReadOnly`,
/// `Memory`) and `Foreign Keys` (`True`/`False`).
use crate::core::db::{
    Command, CommandOptions, CommandType, DataRecord, DataSet, DataTable, DbConnection,
    DbManager, Parameter, ParameterDirection, RecordSink,
};
use crate::core::value::whole_real_to_i64;
use crate::core::{DalError, Result, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Batch, Connection, OpenFlags, OptionalExtension, Row, Statement, ToSql};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Table holding emulated stored procedures
pub const PROCEDURES_TABLE: &str = "dal_procedures";

/// Size given to output parameters declared without one
pub const DEFAULT_OUTPUT_SIZE: usize = 32;

/// A manager bound to the SQLite driver
pub type SqliteManager = DbManager<SqliteConnection>;

/// SQLite storage classes, used as parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqliteType {
    /// Converts `value` to this storage class. Null passes through.
    pub fn coerce(self, value: &Value) -> Result<Value> {
        let coerced = match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (SqliteType::Integer, Value::Integer(_))
            | (SqliteType::Real, Value::Real(_))
            | (SqliteType::Text, Value::Text(_))
            | (SqliteType::Blob, Value::Blob(_)) => Some(value.clone()),
            (SqliteType::Integer, Value::Real(r)) => whole_real_to_i64(*r).map(Value::Integer),
            (SqliteType::Integer, Value::Text(t)) => t.trim().parse().ok().map(Value::Integer),
            (SqliteType::Real, Value::Integer(i)) => Some(Value::Real(*i as f64)),
            (SqliteType::Real, Value::Text(t)) => t.trim().parse().ok().map(Value::Real),
            (SqliteType::Text, Value::Integer(_) | Value::Real(_)) => {
                Some(Value::Text(value.to_string()))
            }
            (SqliteType::Text, Value::Blob(b)) => String::from_utf8(b.clone()).ok().map(Value::Text),
            (SqliteType::Blob, Value::Text(t)) => Some(Value::Blob(t.as_bytes().to_vec())),
            _ => None,
        };
        coerced.ok_or_else(|| {
            DalError::Parameter(format!(
                "Cannot store {} value as {:?}",
                value.type_name(),
                self
            ))
        })
    }
}

/// How the database file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
    Memory,
}

impl OpenMode {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "readwritecreate" => Ok(OpenMode::ReadWriteCreate),
            "readwrite" => Ok(OpenMode::ReadWrite),
            "readonly" => Ok(OpenMode::ReadOnly),
            "memory" => Ok(OpenMode::Memory),
            other => Err(DalError::Config(format!("Unknown open mode '{}'", other))),
        }
    }

    fn flags(self) -> OpenFlags {
        let shared = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::ReadWriteCreate => {
                shared | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            OpenMode::ReadWrite => shared | OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadOnly => shared | OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::Memory => {
                shared
                    | OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_MEMORY
            }
        }
    }
}

/// A parsed SQLite connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConnectionString {
    pub data_source: String,
    pub mode: OpenMode,
    pub foreign_keys: bool,
}

impl SqliteConnectionString {
    pub fn parse(connection_string: &str) -> Result<Self> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(DalError::Config("Connection string is empty".to_string()));
        }

        if !trimmed.contains('=') || trimmed.starts_with("file:") {
            return Ok(SqliteConnectionString {
                data_source: trimmed.to_string(),
                mode: if trimmed == ":memory:" {
                    OpenMode::Memory
                } else {
                    OpenMode::default()
                },
                foreign_keys: false,
            });
        }

        let mut parsed = SqliteConnectionString {
            data_source: String::new(),
            mode: OpenMode::default(),
            foreign_keys: false,
        };
        for pair in trimmed.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DalError::Config(format!("Malformed connection string segment '{}'", pair))
            })?;
            let key: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "datasource" | "filename" => parsed.data_source = value.to_string(),
                "mode" => parsed.mode = OpenMode::parse(value)?,
                "foreignkeys" => parsed.foreign_keys = parse_flag(value)?,
                other => {
                    return Err(DalError::Config(format!(
                        "Unknown connection string keyword '{}'",
                        other
                    )))
                }
            }
        }

        if parsed.data_source.is_empty() && parsed.mode == OpenMode::Memory {
            parsed.data_source = ":memory:".to_string();
        }
        if parsed.data_source.is_empty() {
            return Err(DalError::Config(
                "Connection string has no Data Source".to_string(),
            ));
        }
        if parsed.data_source == ":memory:" {
            parsed.mode = OpenMode::Memory;
        }
        Ok(parsed)
    }

    fn open(&self) -> Result<Connection> {
        let connection = if self.data_source == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open_with_flags(&self.data_source, self.mode.flags())?
        };
        if self.foreign_keys {
            connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        Ok(connection)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(DalError::Config(format!("Expected True or False, got '{}'", other))),
    }
}

/// A connection to a SQLite database
#[derive(Debug)]
pub struct SqliteConnection {
    connection: Option<Connection>,
}

impl SqliteConnection {
    fn handle(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(DalError::NotConnected)
    }
}

impl DbConnection for SqliteConnection {
    type DbType = SqliteType;

    const NAME: &'static str = "sqlite";

    fn open(connection_string: &str) -> Result<Self> {
        let parsed = SqliteConnectionString::parse(connection_string)?;
        let connection = parsed.open()?;
        debug!(data_source = %parsed.data_source, mode = ?parsed.mode, "Opened SQLite database");
        Ok(SqliteConnection {
            connection: Some(connection),
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close().map_err(|(_, err)| DalError::Database(err))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn execute_non_query(&mut self, command: &mut Command<SqliteType>) -> Result<usize> {
        let connection = self.handle()?;
        let sql = resolve_sql(connection, command)?;
        let before = total_changes(connection)?;

        let mut batch = Batch::new(connection, &sql);
        while let Some(mut statement) = batch.next()? {
            bind_parameters(&mut statement, &command.parameters)?;
            let mut rows = statement.raw_query();
            if let Some(row) = rows.next()? {
                capture_outputs(row, &mut command.parameters)?;
                while rows.next()?.is_some() {}
            }
        }

        let after = total_changes(connection)?;
        Ok(usize::try_from(after - before).unwrap_or(0))
    }

    fn execute_scalar(&mut self, command: &mut Command<SqliteType>) -> Result<Value> {
        let connection = self.handle()?;
        let sql = resolve_sql(connection, command)?;

        let mut scalar = None;
        let mut seen_result = false;
        let mut batch = Batch::new(connection, &sql);
        while let Some(mut statement) = batch.next()? {
            bind_parameters(&mut statement, &command.parameters)?;
            let width = statement.column_count();
            let first_result = width > 0 && !seen_result;
            seen_result |= width > 0;
            let mut rows = statement.raw_query();
            if let Some(row) = rows.next()? {
                if first_result {
                    scalar = Some(Value::from(row.get_ref(0)?));
                }
                capture_outputs(row, &mut command.parameters)?;
                while rows.next()?.is_some() {}
            }
        }
        Ok(scalar.unwrap_or(Value::Null))
    }

    fn fill(&mut self, command: &mut Command<SqliteType>) -> Result<DataSet> {
        let connection = self.handle()?;
        let sql = resolve_sql(connection, command)?;

        let mut data_set = DataSet::new();
        let mut batch = Batch::new(connection, &sql);
        while let Some(mut statement) = batch.next()? {
            bind_parameters(&mut statement, &command.parameters)?;
            let width = statement.column_count();
            let columns = column_names(&statement);
            let mut rows = statement.raw_query();
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                if records.is_empty() {
                    capture_outputs(row, &mut command.parameters)?;
                }
                records.push(DataRecord::new(
                    Arc::clone(&columns),
                    record_values(row, width)?,
                ));
            }
            if width > 0 {
                data_set.push(DataTable::from_records(String::new(), columns, records));
            }
        }
        Ok(data_set)
    }

    fn read(
        &mut self,
        command: &mut Command<SqliteType>,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let connection = self.handle()?;
        let sql = resolve_sql(connection, command)?;

        let mut streamed = false;
        let mut batch = Batch::new(connection, &sql);
        while let Some(mut statement) = batch.next()? {
            bind_parameters(&mut statement, &command.parameters)?;
            let width = statement.column_count();
            let stream = width > 0 && !streamed;
            let columns = column_names(&statement);
            if stream {
                streamed = true;
                if !sink.columns(Arc::clone(&columns)) {
                    return Ok(());
                }
            }

            let mut rows = statement.raw_query();
            let mut first = true;
            while let Some(row) = rows.next()? {
                if first {
                    capture_outputs(row, &mut command.parameters)?;
                    first = false;
                }
                if stream
                    && !sink.row(DataRecord::new(
                        Arc::clone(&columns),
                        record_values(row, width)?,
                    ))
                {
                    // Reader dropped; leave the remaining statements unrun
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl DbManager<SqliteConnection> {
    /// Adds an input parameter coerced to `db_type` when bound
    pub fn add_typed_parameter(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        db_type: SqliteType,
    ) -> Result<&mut Self> {
        self.add_prepared_parameter(Parameter::new(name, value).with_db_type(db_type))
    }

    /// Adds an output parameter of the default size
    pub fn add_output_parameter(&mut self, name: &str, db_type: SqliteType) -> Result<&mut Self> {
        self.add_output_parameter_sized(name, db_type, DEFAULT_OUTPUT_SIZE)
    }

    /// Adds an output parameter; text and blob values are cut to `size`
    pub fn add_output_parameter_sized(
        &mut self,
        name: &str,
        db_type: SqliteType,
        size: usize,
    ) -> Result<&mut Self> {
        self.add_prepared_parameter(
            Parameter::new(name, Value::Null)
                .with_direction(ParameterDirection::Output)
                .with_db_type(db_type)
                .with_size(size),
        )
    }

    /// Stores `body` as the stored procedure `name`, replacing any previous
    /// definition. The connection stays open.
    pub fn define_procedure(&mut self, name: &str, body: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (name TEXT PRIMARY KEY, body TEXT NOT NULL); \
             INSERT INTO {table} (name, body) VALUES (:name, :body) \
             ON CONFLICT(name) DO UPDATE SET body = excluded.body",
            table = PROCEDURES_TABLE
        );
        self.add_parameter(":name", name)?
            .add_parameter(":body", body)?
            .execute_non_query(&sql, CommandOptions::text().keep_open())
            .map(|_| ())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(text) => Value::Text(text.to_string()),
                Err(err) => {
                    debug!(bytes = t.len(), error = %err, "TEXT value is not UTF-8, keeping raw bytes");
                    Value::Blob(t.to_vec())
                }
            },
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// Applies the timeout and turns a procedure name into its body
fn resolve_sql(connection: &Connection, command: &Command<SqliteType>) -> Result<String> {
    let timeout = if command.timeout == 0 {
        Duration::from_millis(i32::MAX as u64)
    } else {
        Duration::from_secs(u64::from(command.timeout))
    };
    connection.busy_timeout(timeout)?;

    match command.command_type {
        CommandType::Text => Ok(command.text.clone()),
        CommandType::StoredProcedure => lookup_procedure(connection, &command.text)?
            .ok_or_else(|| {
                DalError::Query(format!("Unknown stored procedure '{}'", command.text))
            }),
    }
}

fn lookup_procedure(connection: &Connection, name: &str) -> Result<Option<String>> {
    let defined: bool = connection.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [PROCEDURES_TABLE],
        |row| row.get(0),
    )?;
    if !defined {
        return Ok(None);
    }
    let body = connection
        .query_row(
            &format!("SELECT body FROM {} WHERE name = ?1", PROCEDURES_TABLE),
            [name],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(body)
}

fn total_changes(connection: &Connection) -> Result<i64> {
    Ok(connection.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

/// Binds parameters by name; names the statement does not use are skipped
fn bind_parameters(
    statement: &mut Statement<'_>,
    parameters: &[Parameter<SqliteType>],
) -> Result<()> {
    for parameter in parameters {
        let index = match parameter_index(statement, parameter)? {
            Some(index) => index,
            None => continue,
        };
        let value = if !parameter.direction.is_input() {
            Value::Null
        } else if let Some(db_type) = parameter.db_type {
            db_type.coerce(&parameter.value)?
        } else {
            parameter.value.clone()
        };
        statement.raw_bind_parameter(index, &value)?;
    }
    Ok(())
}

/// Looks the parameter up as written, then under each sigil
fn parameter_index(
    statement: &Statement<'_>,
    parameter: &Parameter<SqliteType>,
) -> Result<Option<usize>> {
    if let Some(index) = statement.parameter_index(&parameter.name)? {
        return Ok(Some(index));
    }
    let bare = parameter.bare_name();
    for sigil in [':', '@', '$'] {
        if let Some(index) = statement.parameter_index(&format!("{}{}", sigil, bare))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn capture_outputs(row: &Row<'_>, parameters: &mut [Parameter<SqliteType>]) -> Result<()> {
    for parameter in parameters.iter_mut().filter(|p| p.direction.is_output()) {
        let index = match row.as_ref().column_index(parameter.bare_name()) {
            Ok(index) => index,
            Err(_) => continue,
        };
        let mut value = Value::from(row.get_ref(index)?);
        if let Some(db_type) = parameter.db_type {
            value = db_type.coerce(&value)?;
        }
        if let Some(size) = parameter.size {
            value = truncate(value, size);
        }
        parameter.value = value;
    }
    Ok(())
}

fn truncate(value: Value, size: usize) -> Value {
    match value {
        Value::Text(text) if text.chars().count() > size => {
            Value::Text(text.chars().take(size).collect())
        }
        Value::Blob(mut bytes) => {
            bytes.truncate(size);
            Value::Blob(bytes)
        }
        other => other,
    }
}

fn column_names(statement: &Statement<'_>) -> Arc<[String]> {
    statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into()
}

fn record_values(row: &Row<'_>, width: usize) -> Result<Vec<Value>> {
    (0..width)
        .map(|index| Ok(Value::from(row.get_ref(index)?)))
        .collect()
}
