//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod text;

pub use text::{contains_ci, pattern_matches, title_key};
