//! Modules and their hook registrations

use async_trait::async_trait;
use hyper::StatusCode;
use std::fmt;
use std::sync::Arc;

use super::context::RequestContext;
use crate::directive::Directive;

/// Request processing phases, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    TranslatePath,
    CheckAccess,
    CheckAuth,
    TypeCheck,
    Fixup,
    Respond,
    Log,
}

/// What a hook did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// The hook claimed the phase; in `Respond` the status is the response status
    Handled(StatusCode),
    /// Not applicable, try the next hook
    Declined,
    /// Stop processing with this status (errors and redirects)
    Error(StatusCode),
}

/// A server module: directives it owns plus the phases it hooks
///
/// Every hook defaults to `Declined`; `phases` lists the ones that are
/// implemented so only those get registered.
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    fn phases(&self) -> &'static [Phase];

    fn directives(&self) -> Vec<Directive> {
        Vec::new()
    }

    async fn translate_path(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    async fn check_access(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    async fn check_auth(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    async fn type_check(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    async fn fixup(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    async fn respond(&self, _ctx: &mut RequestContext) -> HookResult {
        HookResult::Declined
    }

    /// Runs for every request that reached the pipeline
    async fn log(&self, _ctx: &RequestContext) {}
}

struct Registration {
    phase: Phase,
    module: Arc<dyn Module>,
}

/// Hooks per phase in module load order, frozen after startup
#[derive(Default)]
pub struct HookRegistry {
    registrations: Vec<Registration>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &Arc<dyn Module>) {
        for phase in module.phases() {
            self.registrations.push(Registration {
                phase: *phase,
                module: Arc::clone(module),
            });
        }
    }

    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.registrations
            .iter()
            .filter(move |r| r.phase == phase)
            .map(|r| &r.module)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.registrations
                    .iter()
                    .map(|r| (r.phase, r.module.name())),
            )
            .finish()
    }
}
