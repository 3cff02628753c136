//! Shared utility functions.
//!
//! - `text`: accent folding and UTF-8 safe truncation

mod text;

pub use text::{fold_key, truncate, truncate_chars};
