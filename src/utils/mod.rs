//! Shared utilities: process execution and path handling.

pub mod exec;
pub mod path;
