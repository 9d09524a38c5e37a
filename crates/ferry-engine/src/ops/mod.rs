//! Operation surface
//!
//! Free functions over an [`Interpreter`](crate::interp::Interpreter), one
//! per user-facing command: [`object`] for host objects and their handles,
//! [`library`] for native modules and call bindings. Options arrive already
//! parsed; a command front end only maps its own syntax onto them.

pub mod library;
pub mod object;
mod options;

pub use object::InvokeAllReport;
pub use options::{cleanup_request, DeclareOptions, LoadOptions, ObjectOptions, ResolveOptions};
