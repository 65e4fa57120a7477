//! Command feature handlers.
//!
//! Each module owns one command feature.

pub mod categories_command;
pub mod config_command;
pub mod simulate_command;
