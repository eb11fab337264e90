//! Path utilities.
//!
//! - [`fs`]: Filesystem path normalization and source discovery

pub mod fs;

pub use fs::{find_files, normalize_path, relative_to};
