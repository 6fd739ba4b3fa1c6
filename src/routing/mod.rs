//! Request routing module
//!
//! Maps the Host header onto the server identity that owns the request.

pub mod vhost;

pub use vhost::resolve_virtual_host;
