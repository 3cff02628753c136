//! railclass - LLM batch classification of railway incident reports.
//!
//! A table of free-text reports goes in; each row is classified into a fixed
//! taxonomy by an LLM backend, and the table comes back with a label and a
//! justification column appended. The batch runs strictly in order with a
//! pause between calls and stops early on a run of consecutive failures.

pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod llm;
pub mod table;
pub mod taxonomy;
pub mod utils;

pub use batch::{BatchEvent, BatchOptions, BatchOutcome, BatchRunner, CancelFlag, Termination};
pub use classify::{ClassificationClient, ClassificationResult, ClassificationStatus};
pub use error::SetupError;
pub use table::{Cell, Table};
pub use taxonomy::Taxonomy;
