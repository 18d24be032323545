//! bookindex application library
//!
//! The book record and the index-then-search round trip run against a
//! search collaborator reached through `bookindex_search` sessions.

pub mod modules;
pub mod utils;

/// Re-export commonly used types
pub use modules::*;
