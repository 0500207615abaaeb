/// Database Manager Module
///
/// `DbManager` wraps one driver connection and one command. It prepares
/// commands, binds parameters, runs every execution through a single error
/// guard and releases the connection afterwards unless asked to keep it.
///
/// ## Error policy
///
/// Each manager carries a `propagate_errors` switch. When it is off, a
/// failed execution is logged and the call returns the default value of its
/// result type; when it is on, the error is returned to the caller. Either
/// way the connection is released afterwards unless the caller passed
/// [`CommandOptions::keep_open`].
///
/// ## Usage
///
/// ```no_run
/// use tablescope::core::db::{CommandOptions, SqliteManager};
///
/// # fn main() -> tablescope::core::Result<()> {
/// let mut manager = SqliteManager::connect("inventory.db", true)?;
/// let total: i64 = manager
///     .add_parameter("@min", 10)?
///     .execute_scalar("SELECT count(*) FROM items WHERE qty >= @min", CommandOptions::text())?;
/// # Ok(())
/// # }
/// ```
use crate::core::db::reader::{CollectSink, DataReader};
use crate::core::db::{
    bare_parameter_name, Command, CommandOptions, ConnectionRegistry, DataRecord, DataSet,
    DataTable, DbConnection, Parameter, ParameterDirection, DEFAULT_TABLE_NAME,
};
use crate::core::{DalError, FromValue, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Generic data-access wrapper over a [`DbConnection`] driver
pub struct DbManager<C: DbConnection> {
    connection_string: String,
    propagate_errors: bool,
    connection: Option<C>,
    command: Option<Command<C::DbType>>,
    output_parameters: HashMap<String, Value>,
    executed: bool,
    connection_id: Uuid,
    registered: bool,
    registry: Arc<ConnectionRegistry>,
}

impl<C: DbConnection> DbManager<C> {
    /// Creates a manager and opens its connection.
    ///
    /// An open failure follows the error policy: with `propagate_errors`
    /// the error is returned, otherwise it is logged and the manager is
    /// returned without a connection (the next command retries the open).
    pub fn connect(connection_string: impl Into<String>, propagate_errors: bool) -> Result<Self> {
        Self::connect_with_registry(
            connection_string,
            propagate_errors,
            ConnectionRegistry::global(),
        )
    }

    /// Like [`DbManager::connect`], counting connections in `registry`
    pub fn connect_with_registry(
        connection_string: impl Into<String>,
        propagate_errors: bool,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self> {
        let mut manager = DbManager {
            connection_string: connection_string.into(),
            propagate_errors,
            connection: None,
            command: Some(Command::default()),
            output_parameters: HashMap::new(),
            executed: false,
            connection_id: Uuid::nil(),
            registered: false,
            registry,
        };
        manager.open_connection()?;
        Ok(manager)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Takes effect the next time a connection is opened
    pub fn set_connection_string(&mut self, connection_string: impl Into<String>) {
        self.connection_string = connection_string.into();
    }

    pub fn propagate_errors(&self) -> bool {
        self.propagate_errors
    }

    pub fn set_propagate_errors(&mut self, propagate_errors: bool) {
        self.propagate_errors = propagate_errors;
    }

    pub fn is_open(&self) -> bool {
        self.connection.as_ref().map(|c| c.is_open()).unwrap_or(false)
    }

    /// Identifier of the current connection (nil before the first open)
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    // --- Parameters ---

    /// Adds an input parameter to the current command
    pub fn add_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.add_parameter_with_direction(name, value, ParameterDirection::Input)
    }

    pub fn add_parameter_with_direction(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        direction: ParameterDirection,
    ) -> Result<&mut Self> {
        self.add_parameter_to_command(Parameter::new(name, value).with_direction(direction))
    }

    /// Adds the parameter only when `condition` holds for `value`
    pub fn add_parameter_if<T, P>(
        &mut self,
        name: &str,
        value: T,
        condition: P,
        direction: ParameterDirection,
    ) -> Result<&mut Self>
    where
        T: Into<Value>,
        P: FnOnce(&T) -> bool,
    {
        if condition(&value) {
            self.add_parameter_with_direction(name, value, direction)
        } else {
            Ok(self)
        }
    }

    /// Adds an input parameter only when `value` is present
    pub fn add_parameter_if_exists<T: Into<Value>>(
        &mut self,
        name: &str,
        value: Option<T>,
    ) -> Result<&mut Self> {
        self.add_parameter_if(name, value, Option::is_some, ParameterDirection::Input)
    }

    /// Adds a fully described parameter; its name must not be empty
    pub fn add_prepared_parameter(&mut self, parameter: Parameter<C::DbType>) -> Result<&mut Self> {
        if parameter.name.is_empty() {
            return Err(DalError::Parameter(
                "Parameter name can not be empty".to_string(),
            ));
        }
        self.add_parameter_to_command(parameter)
    }

    /// Value captured for an output parameter by the last execution.
    ///
    /// Fails before the current command has run. A database null yields
    /// `T::default()`.
    pub fn output_parameter<T: FromValue + Default>(&self, name: &str) -> Result<T> {
        if !self.executed {
            return Err(DalError::OutputNotAvailable);
        }
        let value = self
            .output_parameters
            .get(bare_parameter_name(name))
            .ok_or_else(|| DalError::UnknownParameter(name.to_string()))?;
        value_or_default(value.clone())
    }

    // --- Synchronous execution ---

    /// Runs the command and returns the number of affected rows
    pub fn execute_non_query(&mut self, name: &str, options: CommandOptions) -> Result<usize> {
        self.prepare_command(name, options)?;
        let outcome = self.run(|connection, command| connection.execute_non_query(command));
        self.conclude(outcome, options.close_connection)
    }

    /// Runs the command and returns the first column of the first row
    pub fn execute_scalar<T: FromValue + Default>(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<T> {
        self.prepare_command(name, options)?;
        let outcome = self
            .run(|connection, command| connection.execute_scalar(command))
            .and_then(value_or_default::<T>);
        self.conclude(outcome, options.close_connection)
    }

    /// Runs the command and buffers every result set, named `Table`, `Table1`, ...
    pub fn execute_data_set(&mut self, name: &str, options: CommandOptions) -> Result<DataSet> {
        self.prepare_command(name, options)?;
        let outcome = self.run(|connection, command| connection.fill(command));
        let outcome = outcome.map(|mut data_set| {
            data_set.name_tables(DEFAULT_TABLE_NAME);
            data_set
        });
        self.conclude(outcome, options.close_connection)
    }

    /// Runs the command and merges its result sets into `data_set` under
    /// `table_name`, `table_name1`, ...
    pub fn execute_data_set_into(
        &mut self,
        name: &str,
        table_name: &str,
        data_set: &mut DataSet,
        options: CommandOptions,
    ) -> Result<()> {
        self.prepare_command(name, options)?;
        let outcome = self.run(|connection, command| connection.fill(command));
        let filled = self.conclude(outcome, options.close_connection)?;
        merge_named(data_set, filled, table_name);
        Ok(())
    }

    /// Runs the command and returns its first result set
    pub fn execute_data_table(&mut self, name: &str, options: CommandOptions) -> Result<DataTable> {
        let mut data_set = self.execute_data_set(name, options)?;
        Ok(data_set.take_first().unwrap_or_default())
    }

    /// Starts a forward-only reader over the first result set.
    ///
    /// Reader errors are never swallowed. Once the rows are consumed the
    /// connection is closed unless `options` keep it open;
    /// [`DataReader::close`] always releases it.
    pub fn execute_reader(&mut self, name: &str, options: CommandOptions) -> Result<DataReader<'_, C>> {
        self.prepare_command(name, options)?;
        DataReader::start(self, options.close_connection)
    }

    /// Lazy row sequence that releases the connection when exhausted
    /// (unless `options` keep it open).
    pub fn execute_enumerable_reader(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<DataReader<'_, C>> {
        self.prepare_command(name, options)?;
        DataReader::start(self, options.close_connection)
    }

    /// Lazy sequence of `selector` applied to each row
    pub fn execute_enumerable_reader_with<'a, T, F>(
        &'a mut self,
        name: &str,
        mut selector: F,
        options: CommandOptions,
    ) -> Result<impl Iterator<Item = Result<T>> + 'a>
    where
        F: FnMut(&DataRecord) -> T + 'a,
        T: 'a,
    {
        let reader = self.execute_enumerable_reader(name, options)?;
        Ok(reader.map(move |row| row.map(|record| selector(&record))))
    }

    // --- Asynchronous execution ---

    pub async fn execute_non_query_async(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<usize> {
        self.prepare_command(name, options)?;
        let outcome = self
            .run_blocking(|connection, command| connection.execute_non_query(command))
            .await;
        self.conclude(outcome, options.close_connection)
    }

    pub async fn execute_scalar_async<T: FromValue + Default>(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<T> {
        self.prepare_command(name, options)?;
        let outcome = self
            .run_blocking(|connection, command| connection.execute_scalar(command))
            .await
            .and_then(value_or_default::<T>);
        self.conclude(outcome, options.close_connection)
    }

    pub async fn execute_data_set_async(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<DataSet> {
        self.prepare_command(name, options)?;
        let outcome = self
            .run_blocking(|connection, command| {
                let mut data_set = connection.fill(command)?;
                data_set.name_tables(DEFAULT_TABLE_NAME);
                Ok(data_set)
            })
            .await;
        self.conclude(outcome, options.close_connection)
    }

    pub async fn execute_data_table_async(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<DataTable> {
        let mut data_set = self.execute_data_set_async(name, options).await?;
        Ok(data_set.take_first().unwrap_or_default())
    }

    /// Starts a reader, waiting for the first result set without blocking
    /// the runtime
    pub async fn execute_reader_async(
        &mut self,
        name: &str,
        options: CommandOptions,
    ) -> Result<DataReader<'_, C>> {
        self.prepare_command(name, options)?;
        DataReader::start_async(self, options.close_connection).await
    }

    /// Reads every row through `selector` on the blocking pool
    pub async fn execute_enumerable_reader_async<T, F>(
        &mut self,
        name: &str,
        selector: F,
        options: CommandOptions,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnMut(&DataRecord) -> T + Send + 'static,
    {
        self.prepare_command(name, options)?;
        let outcome = self
            .run_blocking(move |connection, command| {
                let mut sink = CollectSink::new(selector);
                connection.read(command, &mut sink)?;
                Ok(sink.into_rows())
            })
            .await;
        self.finish(options.close_connection);
        outcome
    }

    // --- Lifecycle ---

    /// Closes the connection and makes the manager inert until the next
    /// command reopens it. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if connection.is_open() {
                match connection.close() {
                    Ok(()) => {
                        debug!(driver = C::NAME, connection_id = %self.connection_id, "Closed connection")
                    }
                    Err(err) => {
                        warn!(driver = C::NAME, connection_id = %self.connection_id, error = %err, "Failed to close connection")
                    }
                }
            }
        }
        if self.registered {
            self.registry.release(self.connection_id);
            self.registered = false;
        }
        if let Some(mut command) = self.command.take() {
            command.parameters.clear();
        }
        self.executed = true;
    }

    fn open_connection(&mut self) -> Result<()> {
        if self.registered {
            // The previous connection was lost with a failed blocking task
            self.registry.release(self.connection_id);
            self.registered = false;
        }
        let outcome = C::open(&self.connection_string).map(|connection| {
            let id = Uuid::new_v4();
            self.registry.register(id);
            self.connection = Some(connection);
            self.connection_id = id;
            self.registered = true;
            debug!(driver = C::NAME, connection_id = %id, "Opened connection");
        });
        self.guard(outcome)
    }

    /// Reopens what an earlier disposal released
    fn ensure_session(&mut self) -> Result<()> {
        if self.connection.is_none() {
            self.open_connection()?;
        }
        if self.command.is_none() {
            self.command = Some(Command::default());
            self.executed = false;
            self.output_parameters.clear();
        }
        Ok(())
    }

    fn add_parameter_to_command(&mut self, parameter: Parameter<C::DbType>) -> Result<&mut Self> {
        self.ensure_session()?;
        if let Some(command) = self.command.as_mut() {
            command.parameters.push(parameter);
        }
        Ok(self)
    }

    fn prepare_command(&mut self, name: &str, options: CommandOptions) -> Result<()> {
        self.ensure_session()?;
        if let Some(command) = self.command.as_mut() {
            command.text = name.to_string();
            command.command_type = options.command_type;
            command.timeout = options.timeout;
        }
        self.executed = false;
        self.output_parameters.clear();
        if self.registered {
            self.registry.record_command(self.connection_id, name);
        }
        Ok(())
    }

    fn run<T>(
        &mut self,
        op: impl FnOnce(&mut C, &mut Command<C::DbType>) -> Result<T>,
    ) -> Result<T> {
        let connection = match self.connection.as_mut() {
            Some(connection) if connection.is_open() => connection,
            _ => return Err(DalError::NotConnected),
        };
        let command = self.command.as_mut().ok_or(DalError::NotConnected)?;
        let value = op(connection, command)?;
        self.mark_executed();
        Ok(value)
    }

    /// Moves the connection onto the blocking pool for the driver call
    async fn run_blocking<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut C, &mut Command<C::DbType>) -> Result<T> + Send + 'static,
    {
        let (mut connection, mut command) = self.take_session()?;
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = op(&mut connection, &mut command);
            (connection, command, outcome)
        })
        .await;
        match joined {
            Ok((connection, command, outcome)) => {
                self.restore_session(connection, command);
                let value = outcome?;
                self.mark_executed();
                Ok(value)
            }
            Err(err) => Err(DalError::Task(err.to_string())),
        }
    }

    /// Hands the connection and command to a reader or blocking task
    pub(crate) fn take_session(&mut self) -> Result<(C, Command<C::DbType>)> {
        match (self.connection.take(), self.command.take()) {
            (Some(connection), Some(command)) if connection.is_open() => Ok((connection, command)),
            (connection, command) => {
                self.connection = connection;
                self.command = command;
                Err(DalError::NotConnected)
            }
        }
    }

    fn restore_session(&mut self, connection: C, command: Command<C::DbType>) {
        self.connection = Some(connection);
        self.command = Some(command);
    }

    /// Takes the session back from a finished reader
    pub(crate) fn complete_read(
        &mut self,
        session: Option<(C, Command<C::DbType>)>,
        outcome: Result<()>,
        close_connection: bool,
    ) -> Result<()> {
        if let Some((connection, command)) = session {
            self.restore_session(connection, command);
        }
        if outcome.is_ok() {
            self.mark_executed();
        }
        self.finish(close_connection);
        outcome
    }

    fn mark_executed(&mut self) {
        if let Some(command) = self.command.as_ref() {
            self.output_parameters = command
                .output_parameters()
                .map(|p| (p.bare_name().to_string(), p.value.clone()))
                .collect();
        }
        self.executed = true;
    }

    /// Applies the error policy, then releases or resets the session
    fn conclude<T: Default>(&mut self, outcome: Result<T>, close_connection: bool) -> Result<T> {
        let outcome = self.guard(outcome);
        self.finish(close_connection);
        outcome
    }

    fn guard<T: Default>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => Ok(value),
            Err(err) if self.propagate_errors => Err(err),
            Err(err) => {
                error!(
                    driver = C::NAME,
                    command = %self.command_text(),
                    error = %err,
                    "Command failed"
                );
                Ok(T::default())
            }
        }
    }

    fn finish(&mut self, close_connection: bool) {
        if close_connection {
            self.dispose();
        } else if let Some(command) = self.command.as_mut() {
            command.parameters.clear();
        }
    }

    fn command_text(&self) -> &str {
        self.command.as_ref().map(|c| c.text.as_str()).unwrap_or("")
    }
}

impl<C: DbConnection> Drop for DbManager<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn value_or_default<T: FromValue + Default>(value: Value) -> Result<T> {
    if value.is_null() {
        Ok(T::default())
    } else {
        T::from_value(&value)
    }
}

fn merge_named(target: &mut DataSet, mut filled: DataSet, table_name: &str) {
    filled.name_tables(table_name);
    while let Some(table) = filled.take_first() {
        target.merge(table);
    }
}
