//! Sandboxed execution of generated template modules.
//!
//! # Module Structure
//!
//! ```text
//! sandbox/
//! ├── context    # SandboxContext: globals + delegates + function cache
//! ├── module     # generated module statements, concurrent fetch
//! ├── template   # template body scanning and node tree
//! ├── render     # evaluation, Content
//! ├── globals    # dotted-name environment tree
//! ├── registry   # delegate (override) registry
//! ├── natives    # host helper primitives
//! └── support    # runtime support modules
//! ```
//!
//! Each context owns its own globals, so templates loaded for one locale are
//! never visible from another.

mod context;
mod globals;
mod module;
mod natives;
mod registry;
mod render;
mod support;
mod template;

pub use context::{SandboxContext, TemplateFn};
pub use module::{ModuleSource, SyntaxError};
pub use registry::OverrideRegistry;
pub use render::Content;
pub use template::ContentKind;
