//! soyloader - compile Soy templates with an external compiler and serve the
//! generated code from in-process sandbox contexts.
//!
//! ```text
//! sources ─> cache (precompiled reuse) ─> external compiler ─> generated modules
//!                                                                    │
//!            watch (debounced, serialized passes) ──> recompile ─────┤
//!                                                                    ▼
//!                                              sandbox context per locale ─> render
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod logger;
pub mod sandbox;
pub mod utils;
pub mod watch;

pub use compiler::Compiler;
pub use config::{CompileOptions, ConfigError, OptionsPatch};
pub use error::{Error, Result};
pub use sandbox::{Content, SandboxContext, TemplateFn};
pub use watch::PassOutcome;
