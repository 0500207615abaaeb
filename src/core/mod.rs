/// Core Module for Tablescope
///
/// This module contains the data-access layer: the driver-neutral value
/// model, the error type and the generic database wrapper with its SQLite
/// binding.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{DalError, Result};
pub use value::{FromValue, Value};
