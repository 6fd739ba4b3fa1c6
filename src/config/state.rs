// Application state module
// Shared, read-only state handed to every connection

use std::sync::Arc;

use super::types::Settings;
use crate::pipeline::Pipeline;
use crate::scope::StartupConfig;

/// Application state
pub struct AppState {
    pub settings: Settings,
    pub startup: Arc<StartupConfig>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(settings: Settings, startup: StartupConfig, pipeline: Pipeline) -> Self {
        Self {
            settings,
            startup: Arc::new(startup),
            pipeline: Arc::new(pipeline),
        }
    }
}
