//! Request pipeline
//!
//! Phases run in a fixed order over the hooks registered by each module in
//! load order. The first non-declined hook ends a phase. Any error status
//! skips the remaining phases except `Log`.

mod builtin;
pub(crate) mod context;
mod hooks;

pub use builtin::CoreModule;
pub use context::{RequestBody, RequestContext, DIR_MAGIC_TYPE};
pub use hooks::{HookRegistry, HookResult, Module, Phase};

use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;

use crate::directive::{ConfigParser, DirectiveTable};
use crate::http::response;
use crate::http::uri::{is_url, percent_decode};
use crate::logger;
use crate::scope::{normalize_path, walk};

/// Outcome of one phase
enum PhaseOutcome {
    Done,
    Unclaimed,
    Stop(StatusCode),
}

/// Hooks, directive table and limits, built once at startup
pub struct Pipeline {
    hooks: HookRegistry,
    directives: DirectiveTable,
    module_names: Vec<&'static str>,
    server_root: PathBuf,
    max_internal_redirects: usize,
}

impl Pipeline {
    /// Register modules in load order; later modules' directives win on name clashes
    pub fn new(
        modules: Vec<Arc<dyn Module>>,
        server_root: impl Into<PathBuf>,
        max_internal_redirects: usize,
    ) -> Self {
        let mut hooks = HookRegistry::new();
        let mut directives = DirectiveTable::default();
        let mut module_names = Vec::with_capacity(modules.len());
        for module in &modules {
            hooks.register(module);
            for directive in module.directives() {
                directives.insert(directive);
            }
            module_names.push(module.name());
        }
        Self {
            hooks,
            directives,
            module_names,
            server_root: server_root.into(),
            max_internal_redirects,
        }
    }

    /// Parser for directive and override files, knowing every loaded module
    pub fn parser(&self) -> ConfigParser<'_> {
        ConfigParser::new(&self.directives, &self.module_names, &self.server_root)
    }

    pub const fn directives(&self) -> &DirectiveTable {
        &self.directives
    }

    /// Process a request to completion, following internal redirects
    pub async fn run(&self, mut ctx: RequestContext) -> RequestContext {
        loop {
            match self.process(&mut ctx).await {
                Ok(()) => {
                    if ctx.internal_redirect.is_none() {
                        if let Some(original) = ctx.redirect_status {
                            ctx.status = original;
                        }
                    }
                }
                Err(status) => fail(&mut ctx, status),
            }

            let Some(target) = ctx.internal_redirect.take() else {
                break;
            };
            if ctx.redirect_count >= self.max_internal_redirects {
                logger::log_error(&format!(
                    "Request exceeded the limit of {} internal redirects",
                    self.max_internal_redirects
                ));
                let original = ctx.redirect_status.take();
                fail(&mut ctx, StatusCode::INTERNAL_SERVER_ERROR);
                if let Some(original) = original {
                    ctx.status = original;
                }
                ctx.internal_redirect = None;
                break;
            }
            let force_get = ctx.redirect_status.is_some();
            logger::log_debug(&format!("Internal redirect {} -> {target}", ctx.uri));
            ctx = ctx.redirected(&target, force_get);
        }

        for module in self.hooks.for_phase(Phase::Log) {
            module.log(&ctx).await;
        }
        ctx
    }

    async fn process(&self, ctx: &mut RequestContext) -> Result<(), StatusCode> {
        parse_uri(ctx)?;

        match self.run_phase(Phase::TranslatePath, ctx).await {
            PhaseOutcome::Done => {}
            PhaseOutcome::Unclaimed => {
                logger::log_error(&format!("No translation for {}", ctx.uri));
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
            PhaseOutcome::Stop(status) => return Err(status),
        }

        if let Some(filename) = ctx.filename.clone() {
            let located = walk::locate(&filename).await.map_err(|e| e.status())?;
            ctx.filename = Some(located.filename);
            ctx.path_info = located.path_info;
            ctx.finfo = located.metadata;
        }

        let parser = self.parser();
        let target = walk::WalkTarget {
            filename: ctx.filename.as_deref(),
            is_dir: ctx.is_dir(),
            uri: &ctx.uri,
        };
        let config = walk::resolve(&ctx.server, &parser, target)
            .await
            .map_err(|e| {
                logger::log_error(&e.to_string());
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        ctx.config = Arc::new(config);

        if let PhaseOutcome::Stop(status) = self.run_phase(Phase::CheckAccess, ctx).await {
            return Err(status);
        }

        if ctx.config.requires_auth(ctx.method_number) {
            match self.run_phase(Phase::CheckAuth, ctx).await {
                PhaseOutcome::Done => {}
                PhaseOutcome::Unclaimed => {
                    logger::log_error(&format!(
                        "configuration error: no authentication module claimed request {}",
                        ctx.uri
                    ));
                    return Err(StatusCode::INTERNAL_SERVER_ERROR);
                }
                PhaseOutcome::Stop(status) => return Err(status),
            }
        }

        match self.run_phase(Phase::TypeCheck, ctx).await {
            PhaseOutcome::Done => {}
            PhaseOutcome::Unclaimed => {
                logger::log_error(&format!("No type for {}", ctx.uri));
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
            PhaseOutcome::Stop(status) => return Err(status),
        }

        if let PhaseOutcome::Stop(status) = self.run_phase(Phase::Fixup, ctx).await {
            return Err(status);
        }

        match self.run_phase(Phase::Respond, ctx).await {
            PhaseOutcome::Done => Ok(()),
            PhaseOutcome::Unclaimed => Err(StatusCode::NOT_FOUND),
            PhaseOutcome::Stop(status) => Err(status),
        }
    }

    async fn run_phase(&self, phase: Phase, ctx: &mut RequestContext) -> PhaseOutcome {
        for module in self.hooks.for_phase(phase) {
            let result = match phase {
                Phase::TranslatePath => module.translate_path(ctx).await,
                Phase::CheckAccess => module.check_access(ctx).await,
                Phase::CheckAuth => module.check_auth(ctx).await,
                Phase::TypeCheck => module.type_check(ctx).await,
                Phase::Fixup => module.fixup(ctx).await,
                Phase::Respond => module.respond(ctx).await,
                Phase::Log => HookResult::Declined,
            };
            match result {
                HookResult::Declined => {}
                HookResult::Handled(status) => {
                    if phase == Phase::Respond {
                        ctx.status = status;
                    }
                    return PhaseOutcome::Done;
                }
                HookResult::Error(status) => return PhaseOutcome::Stop(status),
            }
        }
        PhaseOutcome::Unclaimed
    }
}

/// Turn an error status into a response, honoring `ErrorDocument`
fn fail(ctx: &mut RequestContext, status: StatusCode) {
    ctx.internal_redirect = None;
    ctx.body = Bytes::new();

    // An error while serving an error document reports the first error
    if let Some(original) = ctx.redirect_status {
        ctx.status = original;
        default_body(ctx);
        return;
    }
    ctx.status = status;

    let document = if status.as_u16() >= 400 {
        ctx.config.error_document(status.as_u16()).map(str::to_string)
    } else {
        None
    };
    match document {
        Some(doc) if doc.starts_with('"') => {
            ctx.body = Bytes::from(doc[1..].to_string());
            ctx.headers_out
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        }
        Some(doc) if is_url(&doc) => match HeaderValue::from_str(&doc) {
            Ok(location) => {
                ctx.status = StatusCode::FOUND;
                ctx.headers_out.insert(LOCATION, location);
                default_body(ctx);
            }
            Err(_) => default_body(ctx),
        },
        Some(doc) if doc.starts_with('/') => {
            ctx.redirect_status = Some(status);
            ctx.internal_redirect = Some(doc);
        }
        Some(doc) => {
            logger::log_warning(&format!(
                "ErrorDocument for {} is not a URL, a local path or quoted text: {doc}",
                status.as_u16()
            ));
            default_body(ctx);
        }
        None => default_body(ctx),
    }
}

/// Standard error page when nothing else produced a body
fn default_body(ctx: &mut RequestContext) {
    if ctx.status.is_success() || ctx.status == StatusCode::NOT_MODIFIED {
        return;
    }
    let location = ctx
        .headers_out
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let signature = response::server_signature(
        ctx.config.server_signature(),
        ctx.server.host_name(),
        ctx.server.port,
        ctx.server.admin.as_deref(),
    );
    let page = response::error_page(
        ctx.status,
        &ctx.uri,
        ctx.method.as_str(),
        &location,
        &signature,
    );
    ctx.body = Bytes::from(page);
    ctx.headers_out
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
}

/// Decode and normalize the request path before any hook sees it
fn parse_uri(ctx: &mut RequestContext) -> Result<(), StatusCode> {
    if ctx.unparsed_uri == "*" {
        if ctx.method == hyper::Method::OPTIONS {
            ctx.uri = "*".to_string();
            return Ok(());
        }
        return Err(StatusCode::BAD_REQUEST);
    }
    if !ctx.unparsed_uri.starts_with('/') {
        logger::log_error(&format!("Invalid URI in request: {}", ctx.unparsed_uri));
        return Err(StatusCode::BAD_REQUEST);
    }
    let decoded = percent_decode(&ctx.unparsed_uri)?;
    ctx.uri = normalize_path(&decoded).ok_or(StatusCode::BAD_REQUEST)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::context::tests::context;
    use super::*;
    use async_trait::async_trait;
    use hyper::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_uri() {
        let mut ctx = context(Method::GET, "/docs/./a/../b.html");
        parse_uri(&mut ctx).unwrap();
        assert_eq!(ctx.uri, "/docs/b.html");

        let mut ctx = context(Method::GET, "/a%2Fb");
        assert_eq!(parse_uri(&mut ctx), Err(StatusCode::NOT_FOUND));

        let mut ctx = context(Method::GET, "/../etc/passwd");
        assert_eq!(parse_uri(&mut ctx), Err(StatusCode::BAD_REQUEST));

        let mut ctx = context(Method::GET, "*");
        assert_eq!(parse_uri(&mut ctx), Err(StatusCode::BAD_REQUEST));
        let mut ctx = context(Method::OPTIONS, "*");
        assert!(parse_uri(&mut ctx).is_ok());
    }

    /// Claims every phase it is registered for, counting calls
    struct Claim {
        phases: &'static [Phase],
        respond: HookResult,
        calls: AtomicUsize,
        logged: AtomicUsize,
    }

    impl Claim {
        fn new(phases: &'static [Phase], respond: HookResult) -> Arc<Self> {
            Arc::new(Self {
                phases,
                respond,
                calls: AtomicUsize::new(0),
                logged: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Module for Claim {
        fn name(&self) -> &'static str {
            "claim"
        }

        fn phases(&self) -> &'static [Phase] {
            self.phases
        }

        async fn translate_path(&self, _ctx: &mut RequestContext) -> HookResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HookResult::Handled(StatusCode::OK)
        }

        async fn type_check(&self, _ctx: &mut RequestContext) -> HookResult {
            HookResult::Handled(StatusCode::OK)
        }

        async fn respond(&self, ctx: &mut RequestContext) -> HookResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ctx.uri == "/loop" {
                ctx.internal_redirect = Some("/loop".to_string());
                return HookResult::Handled(StatusCode::OK);
            }
            self.respond
        }

        async fn log(&self, _ctx: &RequestContext) {
            self.logged.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pipeline(module: &Arc<Claim>) -> Pipeline {
        let module: Arc<dyn Module> = Arc::clone(module) as Arc<dyn Module>;
        Pipeline::new(vec![module], "/", 3)
    }

    const ALL: &[Phase] = &[Phase::TranslatePath, Phase::TypeCheck, Phase::Respond, Phase::Log];

    #[tokio::test]
    async fn test_unclaimed_respond_is_not_found() {
        let module = Claim::new(
            &[Phase::TranslatePath, Phase::TypeCheck, Phase::Log],
            HookResult::Declined,
        );
        let ctx = pipeline(&module).run(context(Method::GET, "/x")).await;
        assert_eq!(ctx.status, StatusCode::NOT_FOUND);
        assert_eq!(module.logged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unclaimed_translate_is_server_error() {
        let module = Claim::new(&[Phase::Respond, Phase::Log], HookResult::Declined);
        let ctx = pipeline(&module).run(context(Method::GET, "/x")).await;
        assert_eq!(ctx.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(module.calls.load(Ordering::SeqCst), 0);
        assert_eq!(module.logged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_skips_to_log() {
        let module = Claim::new(ALL, HookResult::Error(StatusCode::FORBIDDEN));
        let ctx = pipeline(&module).run(context(Method::GET, "/x")).await;
        assert_eq!(ctx.status, StatusCode::FORBIDDEN);
        assert!(!ctx.body.is_empty());
        assert_eq!(module.logged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redirect_loop_bounded() {
        let module = Claim::new(ALL, HookResult::Handled(StatusCode::OK));
        let ctx = pipeline(&module).run(context(Method::GET, "/loop")).await;
        assert_eq!(ctx.status, StatusCode::INTERNAL_SERVER_ERROR);
        // Initial pass plus three redirects, two hooks each
        assert_eq!(module.calls.load(Ordering::SeqCst), 8);
        assert_eq!(module.logged.load(Ordering::SeqCst), 1);
    }
}
