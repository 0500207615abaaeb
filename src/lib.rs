// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod catalog;
pub mod config;
pub mod results_grid;
pub mod tui;

#[cfg(test)]
pub mod test_utils;
