//! Command-line interface for railclass.

mod commands;
pub mod helpers;

pub use commands::{is_verbose, run};
