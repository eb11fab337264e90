//! Precompiled-artifact cache.
//!
//! Decides which sources already have reusable compiled output and copies
//! that output into the active output root.

mod artifact;
mod hash;

pub use artifact::filter_dirty;
pub use hash::{ContentHash, hash_bytes, hash_file};
