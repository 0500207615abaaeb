/// Reader Module
///
/// Forward-only readers over a single result set. A worker thread owns the
/// connection while the rows are streamed and hands it back to the manager
/// once the result set is exhausted, the reader is closed or it is dropped.
use crate::core::db::{
    Command, DataRecord, DataTable, DbConnection, DbManager, RecordSink,
};
use crate::core::{DalError, Result};
use std::sync::mpsc::{self, Receiver, RecvError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

enum ReaderEvent {
    Columns(Arc<[String]>),
    Row(DataRecord),
}

/// Forwards rows to the reader; a rendezvous channel keeps the worker one
/// row ahead at most.
struct ChannelSink {
    sender: SyncSender<ReaderEvent>,
}

impl RecordSink for ChannelSink {
    fn columns(&mut self, columns: Arc<[String]>) -> bool {
        self.sender.send(ReaderEvent::Columns(columns)).is_ok()
    }

    fn row(&mut self, record: DataRecord) -> bool {
        self.sender.send(ReaderEvent::Row(record)).is_ok()
    }
}

/// Maps every row through a selector and keeps the results
pub(crate) struct CollectSink<F, T> {
    selector: F,
    rows: Vec<T>,
}

impl<F, T> CollectSink<F, T>
where
    F: FnMut(&DataRecord) -> T,
{
    pub(crate) fn new(selector: F) -> Self {
        CollectSink {
            selector,
            rows: Vec::new(),
        }
    }

    pub(crate) fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<F, T> RecordSink for CollectSink<F, T>
where
    F: FnMut(&DataRecord) -> T,
{
    fn columns(&mut self, _columns: Arc<[String]>) -> bool {
        true
    }

    fn row(&mut self, record: DataRecord) -> bool {
        self.rows.push((self.selector)(&record));
        true
    }
}

type Worker<C> = JoinHandle<(C, Command<<C as DbConnection>::DbType>, Result<()>)>;

/// A lazily read result set.
///
/// Iterating yields each row once, in order. When the rows run out the
/// connection goes back to the manager, which then either disposes it or
/// keeps it open with cleared parameters. Dropping the reader early does
/// the same. The reader cannot be restarted.
pub struct DataReader<'m, C: DbConnection> {
    manager: &'m mut DbManager<C>,
    columns: Arc<[String]>,
    events: Option<Receiver<ReaderEvent>>,
    worker: Option<Worker<C>>,
    pending: Option<DataRecord>,
    close_on_finish: bool,
}

impl<'m, C: DbConnection> DataReader<'m, C> {
    pub(crate) fn start(manager: &'m mut DbManager<C>, close_on_finish: bool) -> Result<Self> {
        let (events, worker) = spawn_worker(manager)?;
        let first = events.recv();
        let mut reader = DataReader::new(manager, Some(events), worker, close_on_finish);
        reader.accept_first(first)?;
        Ok(reader)
    }

    pub(crate) async fn start_async(
        manager: &'m mut DbManager<C>,
        close_on_finish: bool,
    ) -> Result<Self> {
        let (events, worker) = spawn_worker(manager)?;
        let mut reader = DataReader::new(manager, None, worker, close_on_finish);
        let received = tokio::task::spawn_blocking(move || {
            let first = events.recv();
            (events, first)
        })
        .await;
        match received {
            Ok((events, first)) => {
                reader.events = Some(events);
                reader.accept_first(first)?;
                Ok(reader)
            }
            Err(err) => {
                reader.finish()?;
                Err(DalError::Task(err.to_string()))
            }
        }
    }

    fn new(
        manager: &'m mut DbManager<C>,
        events: Option<Receiver<ReaderEvent>>,
        worker: Worker<C>,
        close_on_finish: bool,
    ) -> Self {
        DataReader {
            manager,
            columns: Arc::from(Vec::<String>::new()),
            events,
            worker: Some(worker),
            pending: None,
            close_on_finish,
        }
    }

    fn accept_first(&mut self, first: std::result::Result<ReaderEvent, RecvError>) -> Result<()> {
        match first {
            Ok(ReaderEvent::Columns(columns)) => {
                self.columns = columns;
                Ok(())
            }
            Ok(ReaderEvent::Row(record)) => {
                self.columns = Arc::from(record.columns());
                self.pending = Some(record);
                Ok(())
            }
            // The command produced no result set, or failed before one
            Err(_) => self.finish(),
        }
    }

    /// Column names of the result set, empty when there is none
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Advances to the next row
    pub fn read(&mut self) -> Result<Option<DataRecord>> {
        self.next().transpose()
    }

    /// Reads the remaining rows into a table called `name`
    pub fn into_table(mut self, name: impl Into<String>) -> Result<DataTable> {
        let mut rows = Vec::new();
        while let Some(row) = self.next() {
            rows.push(row?);
        }
        Ok(DataTable::from_records(name, Arc::clone(&self.columns), rows))
    }

    /// Stops reading and disposes the manager's connection
    pub fn close(mut self) -> Result<()> {
        let outcome = self.finish();
        self.manager.dispose();
        outcome
    }

    fn finish(&mut self) -> Result<()> {
        // Dropping the receiver stops a worker blocked on the next row
        self.events = None;
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Ok(()),
        };
        let (session, outcome) = match worker.join() {
            Ok((connection, command, outcome)) => (Some((connection, command)), outcome),
            Err(_) => (
                None,
                Err(DalError::Task("reader worker panicked".to_string())),
            ),
        };
        debug!(
            driver = C::NAME,
            close_connection = self.close_on_finish,
            "Reader finished"
        );
        self.manager
            .complete_read(session, outcome, self.close_on_finish)
    }
}

impl<C: DbConnection> Iterator for DataReader<'_, C> {
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.pending.take() {
            return Some(Ok(record));
        }
        loop {
            let event = self.events.as_ref()?.recv();
            match event {
                Ok(ReaderEvent::Row(record)) => return Some(Ok(record)),
                Ok(ReaderEvent::Columns(columns)) => self.columns = columns,
                Err(_) => {
                    return match self.finish() {
                        Ok(()) => None,
                        Err(err) => Some(Err(err)),
                    }
                }
            }
        }
    }
}

impl<C: DbConnection> Drop for DataReader<'_, C> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(driver = C::NAME, error = %err, "Reader failed while closing");
        }
    }
}

fn spawn_worker<C: DbConnection>(
    manager: &mut DbManager<C>,
) -> Result<(Receiver<ReaderEvent>, Worker<C>)> {
    let (mut connection, mut command) = manager.take_session()?;
    let (sender, events) = mpsc::sync_channel(0);
    let worker = thread::Builder::new()
        .name("tablescope-reader".to_string())
        .spawn(move || {
            let mut sink = ChannelSink { sender };
            let outcome = connection.read(&mut command, &mut sink);
            (connection, command, outcome)
        })?;
    Ok((events, worker))
}
