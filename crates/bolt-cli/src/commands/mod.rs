//! CLI command handlers.

pub mod classify;
pub mod parse;
pub mod patch;
pub mod run;
