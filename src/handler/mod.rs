//! Request handler module
//!
//! The HTTP entry point plus the content modules loaded besides the core:
//! directory indexes and per-user directories. The core's default content
//! handler lives in `static_files`.

pub mod dir_index;
pub mod router;
pub mod static_files;
pub mod userdir;

// Re-export main entry point
pub use dir_index::DirIndex;
pub use router::handle_request;
pub use userdir::UserDir;
