//! The core module: path translation, content typing, the default content
//! handler and the access log

use async_trait::async_trait;
use hyper::StatusCode;
use std::net::IpAddr;
use std::path::PathBuf;

use super::context::{RequestContext, DIR_MAGIC_TYPE};
use super::hooks::{HookResult, Module, Phase};
use crate::config::Settings;
use crate::directive::{commands, Directive};
use crate::handler::static_files;
use crate::http::mime;
use crate::logger::{self, AccessLogEntry};
use crate::scope::HostnameLookups;

#[derive(Debug, Clone)]
pub struct CoreModule {
    mmap_threshold: u64,
    /// Access log format, `None` when access logging is off
    access_log: Option<String>,
}

impl CoreModule {
    pub const fn new(mmap_threshold: u64, access_log: Option<String>) -> Self {
        Self {
            mmap_threshold,
            access_log,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let access_log = settings
            .logging
            .access_log
            .then(|| settings.logging.access_log_format.clone());
        Self::new(settings.performance.mmap_threshold, access_log)
    }
}

#[async_trait]
impl Module for CoreModule {
    fn name(&self) -> &'static str {
        "core"
    }

    fn phases(&self) -> &'static [Phase] {
        &[
            Phase::TranslatePath,
            Phase::TypeCheck,
            Phase::Respond,
            Phase::Log,
        ]
    }

    fn directives(&self) -> Vec<Directive> {
        commands::directives()
    }

    async fn translate_path(&self, ctx: &mut RequestContext) -> HookResult {
        if ctx.uri == "*" {
            return HookResult::Handled(StatusCode::OK);
        }
        if !ctx.uri.starts_with('/') {
            logger::log_error(&format!("Invalid URI in request: {}", ctx.unparsed_uri));
            return HookResult::Error(StatusCode::BAD_REQUEST);
        }
        let root = ctx.server.document_root.to_string_lossy();
        let root = root.trim_end_matches('/');
        ctx.filename = Some(PathBuf::from(format!("{root}{}", ctx.uri)));
        HookResult::Handled(StatusCode::OK)
    }

    async fn type_check(&self, ctx: &mut RequestContext) -> HookResult {
        let Some(filename) = ctx.filename.as_deref() else {
            return HookResult::Handled(StatusCode::OK);
        };
        let content_type = if ctx.is_dir() {
            DIR_MAGIC_TYPE
        } else {
            mime::for_path(filename).unwrap_or_else(|| ctx.config.default_type())
        };
        ctx.content_type = Some(content_type.to_string());
        HookResult::Handled(StatusCode::OK)
    }

    async fn respond(&self, ctx: &mut RequestContext) -> HookResult {
        static_files::serve(ctx, self.mmap_threshold).await
    }

    async fn log(&self, ctx: &RequestContext) {
        let Some(format) = &self.access_log else {
            return;
        };
        let mut entry = access_entry(ctx);
        entry.remote_host =
            remote_host(ctx.remote_addr.ip(), ctx.config.hostname_lookups()).await;
        logger::log_access(&entry, format);
    }
}

/// Client name for the log under `HostnameLookups`, the address when unknown
///
/// `Double` keeps a name only when its forward lookup leads back to the
/// client address.
async fn remote_host(ip: IpAddr, lookups: HostnameLookups) -> String {
    if lookups == HostnameLookups::Off {
        return ip.to_string();
    }
    let name = match tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip)).await {
        Ok(Ok(name)) => name.to_ascii_lowercase(),
        Ok(Err(e)) => {
            logger::log_debug(&format!("reverse lookup of {ip} failed: {e}"));
            return ip.to_string();
        }
        Err(_) => return ip.to_string(),
    };
    if lookups == HostnameLookups::Double {
        let confirmed = tokio::net::lookup_host((name.as_str(), 0))
            .await
            .is_ok_and(|mut addrs| addrs.any(|addr| addr.ip() == ip));
        if !confirmed {
            logger::log_warning(&format!(
                "double reverse lookup of {ip} failed: {name} does not map back"
            ));
            return ip.to_string();
        }
    }
    name
}

fn access_entry(ctx: &RequestContext) -> AccessLogEntry {
    let mut entry =
        AccessLogEntry::new(ctx.remote_addr.ip().to_string(), ctx.request_line.clone());
    entry.server_name = ctx.server.host_name().to_string();
    entry.served_uri.clone_from(&ctx.uri);
    entry.status = ctx.status.as_u16();
    entry.body_bytes = if ctx.header_only {
        0
    } else {
        ctx.body.len() as u64
    };
    entry.headers = ctx.headers_in.clone();
    entry.request_time_us = u64::try_from(ctx.started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}
