/// Connection Module
///
/// The driver abstraction every database binding implements, and the
/// process-wide registry of open connections.
use crate::core::db::{Command, DataRecord, DataSet};
use crate::core::{Result, Value};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Receives the rows of a streamed result set.
///
/// Both methods return `false` when the consumer has gone away; the driver
/// then stops reading.
pub trait RecordSink {
    /// Called once with the column names before any row
    fn columns(&mut self, columns: Arc<[String]>) -> bool;
    fn row(&mut self, record: DataRecord) -> bool;
}

/// A driver connection.
///
/// One implementation exists per supported driver. The generic
/// [`DbManager`](crate::core::db::DbManager) owns exactly one value of this
/// type and routes every execution through it. Implementations write the
/// values of output parameters back into `command.parameters`.
pub trait DbConnection: Send + Sized + 'static {
    /// Driver-specific parameter type (storage class, SQL type, ...)
    type DbType: Copy + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// Short driver name attached to log events
    const NAME: &'static str;

    /// Opens a connection described by a driver-specific connection string
    fn open(connection_string: &str) -> Result<Self>;

    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Runs the command and returns the number of affected rows
    fn execute_non_query(&mut self, command: &mut Command<Self::DbType>) -> Result<usize>;

    /// Runs the command and returns the first column of the first row,
    /// `Value::Null` when there is none
    fn execute_scalar(&mut self, command: &mut Command<Self::DbType>) -> Result<Value>;

    /// Runs the command and buffers every result set as an unnamed table
    fn fill(&mut self, command: &mut Command<Self::DbType>) -> Result<DataSet>;

    /// Runs the command and streams the first result set into `sink`
    fn read(
        &mut self,
        command: &mut Command<Self::DbType>,
        sink: &mut dyn RecordSink,
    ) -> Result<()>;
}

static GLOBAL_REGISTRY: Lazy<Arc<ConnectionRegistry>> =
    Lazy::new(|| Arc::new(ConnectionRegistry::new()));

/// Count of open connections and the last command run on each.
///
/// The command names are diagnostic only.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    active: AtomicUsize,
    commands: DashMap<Uuid, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by managers unless told otherwise
    pub fn global() -> Arc<ConnectionRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Last command names of the currently open connections
    pub fn opened_connections(&self) -> Vec<String> {
        self.commands.iter().map(|entry| entry.value().clone()).collect()
    }

    pub(crate) fn register(&self, id: Uuid) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.commands.insert(id, String::new());
    }

    pub(crate) fn record_command(&self, id: Uuid, command: &str) {
        if let Some(mut entry) = self.commands.get_mut(&id) {
            *entry = command.to_string();
        }
    }

    pub(crate) fn release(&self, id: Uuid) {
        if self.commands.remove(&id).is_some() {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
