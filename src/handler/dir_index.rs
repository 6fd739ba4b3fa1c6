//! Directory index module
//!
//! Claims directory requests: a missing trailing slash is redirected to the
//! canonical URL, otherwise the first existing `DirectoryIndex` file is
//! served through an internal redirect.

use async_trait::async_trait;
use hyper::header::{HeaderValue, LOCATION};
use hyper::StatusCode;

use crate::directive::{ArgSpec, Args, CmdParms, Directive};
use crate::http::uri::escape_path;
use crate::logger;
use crate::pipeline::{HookResult, Module, Phase, RequestContext, DIR_MAGIC_TYPE};
use crate::scope::{DirConfig, MergeConfig, Override};

const MODULE: &str = "mod_dir";
pub const DEFAULT_INDEX: &str = "index.html";

/// Per-directory index file names
#[derive(Debug, Clone, Default)]
pub struct DirIndexConfig {
    pub names: Vec<String>,
}

impl MergeConfig for DirIndexConfig {
    fn merge(&self, overlay: &Self) -> Self {
        if overlay.names.is_empty() {
            self.clone()
        } else {
            overlay.clone()
        }
    }
}

fn set_directory_index(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    dir.modules
        .update::<DirIndexConfig>(MODULE, |config| config.names.clone_from(&args.words));
    Ok(())
}

#[derive(Debug, Default)]
pub struct DirIndex;

#[async_trait]
impl Module for DirIndex {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Respond]
    }

    fn directives(&self) -> Vec<Directive> {
        vec![Directive::dir(
            "DirectoryIndex",
            set_directory_index,
            Override::INDEXES,
            ArgSpec::OneOrMore,
            "a list of file names",
        )]
    }

    async fn respond(&self, ctx: &mut RequestContext) -> HookResult {
        if ctx.content_type.as_deref() != Some(DIR_MAGIC_TYPE) {
            return HookResult::Declined;
        }

        if !ctx.uri.ends_with('/') {
            let mut target = format!("{}/", escape_path(&ctx.uri));
            if let Some(args) = &ctx.args {
                target.push('?');
                target.push_str(args);
            }
            let url = ctx.construct_url(&target);
            return match HeaderValue::from_str(&url) {
                Ok(location) => {
                    ctx.headers_out.insert(LOCATION, location);
                    HookResult::Error(StatusCode::MOVED_PERMANENTLY)
                }
                Err(e) => {
                    logger::log_error(&format!("Cannot redirect to {url}: {e}"));
                    HookResult::Error(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
        }

        let Some(dir) = ctx.filename.clone() else {
            return HookResult::Declined;
        };
        let names = ctx
            .config
            .module::<DirIndexConfig>(MODULE)
            .map(|c| c.names.clone())
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_INDEX.to_string()]);

        for name in names {
            let (candidate, uri) = match name.strip_prefix('/') {
                Some(rest) => (ctx.server.document_root.join(rest), name.clone()),
                None => (dir.join(&name), format!("{}{name}", ctx.uri)),
            };
            let exists = tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|meta| meta.is_file());
            if !exists {
                continue;
            }
            let mut target = escape_path(&uri);
            if let Some(args) = &ctx.args {
                target.push('?');
                target.push_str(args);
            }
            ctx.internal_redirect = Some(target);
            return HookResult::Handled(StatusCode::OK);
        }
        HookResult::Declined
    }
}
