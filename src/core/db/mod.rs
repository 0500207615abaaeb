/// Database Module
///
/// The data-access layer of Tablescope, organized into focused submodules.
///
/// ## Architecture
///
/// - **Commands** (`command.rs`): Command text, parameters and per-execution options
/// - **Result Data** (`data.rs`): Records, tables and data sets
/// - **Connections** (`connection.rs`): The driver trait and the open-connection registry
/// - **Manager** (`manager.rs`): The generic wrapper with its error guard and lifecycle
/// - **Readers** (`reader.rs`): Forward-only, lazily streamed result sets
/// - **SQLite** (`sqlite.rs`): The bundled driver and its manager conveniences
///
/// ## Error Handling
///
/// All operations return the standardized `DalError` type. Whether a failed
/// execution reaches the caller is decided per manager.
pub mod command;
pub mod connection;
pub mod data;
pub mod manager;
pub mod reader;
pub mod sqlite;

pub use command::*;
pub use connection::*;
pub use data::*;
pub use manager::DbManager;
pub use reader::DataReader;
pub use sqlite::{
    OpenMode, SqliteConnection, SqliteConnectionString, SqliteManager, SqliteType,
    DEFAULT_OUTPUT_SIZE, PROCEDURES_TABLE,
};
