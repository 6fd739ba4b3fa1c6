//! scopehttpd
//!
//! A static HTTP server configured by an Apache-style directive file:
//! `<Directory>`, `<Location>` and `<Files>` sections merged per request,
//! per-directory override files, and a phase pipeline that modules hook
//! into.

pub mod config;
pub mod directive;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod pipeline;
pub mod routing;
pub mod scope;
pub mod server;

use std::sync::Arc;

use pipeline::{CoreModule, Module, Pipeline};

/// Modules in load order: user directories translate before the core, and
/// the directory index responds before the default handler
pub fn standard_modules(settings: &config::Settings) -> Vec<Arc<dyn Module>> {
    vec![
        Arc::new(handler::UserDir),
        Arc::new(handler::DirIndex),
        Arc::new(CoreModule::from_settings(settings)),
    ]
}

/// Pipeline with the standard modules and the configured limits
pub fn standard_pipeline(settings: &config::Settings) -> Pipeline {
    Pipeline::new(
        standard_modules(settings),
        settings.server_root(),
        settings.performance.max_internal_redirects,
    )
}
