//! Per-user directories
//!
//! Maps `/~user/rest` onto a directory of that user's, or redirects it to
//! another server when the `UserDir` entry is a URL.

use async_trait::async_trait;
use hyper::header::{HeaderValue, LOCATION};
use hyper::StatusCode;
use std::path::{Path, PathBuf};

use crate::directive::{ArgSpec, Args, CmdParms, Directive};
use crate::logger;
use crate::pipeline::{HookResult, Module, Phase, RequestContext};
use crate::scope::{MergeConfig, ServerBuilder};

const MODULE: &str = "mod_userdir";
pub const DEFAULT_USER_DIR: &str = "public_html";
const HOME_ROOT: &str = "/home";

/// Server-level `UserDir` settings
#[derive(Debug, Clone, Default)]
pub struct UserDirConfig {
    /// `None` until a `UserDir` path list is given
    pub dirs: Option<Vec<String>>,
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    pub globally_disabled: bool,
}

impl UserDirConfig {
    fn dirs(&self) -> Vec<&str> {
        match &self.dirs {
            Some(dirs) => dirs.iter().map(String::as_str).collect(),
            None => vec![DEFAULT_USER_DIR],
        }
    }
}

impl MergeConfig for UserDirConfig {
    fn merge(&self, overlay: &Self) -> Self {
        overlay.clone()
    }
}

fn set_user_dir(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    let keyword = args.first().to_ascii_lowercase();
    let users = args.words.get(1..).unwrap_or_default();
    match keyword.as_str() {
        "disable" | "disabled" => {
            server
                .modules
                .update::<UserDirConfig>(MODULE, |config| {
                    if users.is_empty() {
                        config.globally_disabled = true;
                    } else {
                        config.disabled.extend(users.iter().cloned());
                    }
                });
        }
        "enable" | "enabled" => {
            if users.is_empty() {
                return Err("UserDir \"enable\" keyword requires a list of usernames".to_string());
            }
            server
                .modules
                .update::<UserDirConfig>(MODULE, |config| config.enabled.extend(users.iter().cloned()));
        }
        _ => {
            server
                .modules
                .update::<UserDirConfig>(MODULE, |config| config.dirs = Some(args.words.clone()));
        }
    }
    Ok(())
}

/// Where one `UserDir` entry sends a user's request
#[derive(Debug, PartialEq, Eq)]
enum Mapping {
    File(PathBuf),
    Redirect(String),
}

/// Apply one `UserDir` entry to `user`, `rest` being the path after `/~user`
fn map_entry(entry: &str, user: &str, rest: &str) -> Mapping {
    let (prefix, tail) = match entry.split_once('*') {
        Some((prefix, tail)) => (Some(prefix), tail),
        None => (None, entry),
    };
    if tail.is_empty() || tail.starts_with('/') {
        match prefix {
            Some(prefix) if prefix.contains(':') => {
                Mapping::Redirect(format!("{prefix}{user}{tail}{rest}"))
            }
            Some(prefix) => Mapping::File(PathBuf::from(format!("{prefix}{user}{tail}"))),
            None => Mapping::File(Path::new(tail).join(user)),
        }
    } else if tail.contains(':') {
        Mapping::Redirect(format!("{tail}/{user}{rest}"))
    } else {
        Mapping::File(Path::new(HOME_ROOT).join(user).join(tail))
    }
}

#[derive(Debug, Default)]
pub struct UserDir;

#[async_trait]
impl Module for UserDir {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::TranslatePath]
    }

    fn directives(&self) -> Vec<Directive> {
        vec![Directive::server(
            "UserDir",
            set_user_dir,
            ArgSpec::OneOrMore,
            "the public subdirectory in users' home directories, or 'disabled', or 'disabled username username...', or 'enabled username username...'",
        )]
    }

    async fn translate_path(&self, ctx: &mut RequestContext) -> HookResult {
        let Some(after) = ctx.uri.strip_prefix("/~") else {
            return HookResult::Declined;
        };
        let (user, rest) = match after.find('/') {
            Some(idx) => (&after[..idx], &after[idx..]),
            None => (after, ""),
        };
        if user.is_empty() || user == "." || user == ".." {
            return HookResult::Declined;
        }

        let default = UserDirConfig::default();
        let config = ctx
            .server
            .modules
            .get::<UserDirConfig>(MODULE)
            .unwrap_or(&default);
        if config.disabled.iter().any(|u| u == user) {
            return HookResult::Declined;
        }
        if config.globally_disabled && !config.enabled.iter().any(|u| u == user) {
            return HookResult::Declined;
        }

        let dirs = config.dirs();
        let last = dirs.len().saturating_sub(1);
        let mut translated = None;
        for (i, entry) in dirs.iter().enumerate() {
            match map_entry(entry, user, rest) {
                Mapping::Redirect(url) => {
                    return match HeaderValue::from_str(&url) {
                        Ok(location) => {
                            ctx.headers_out.insert(LOCATION, location);
                            HookResult::Error(StatusCode::FOUND)
                        }
                        Err(e) => {
                            logger::log_error(&format!("Cannot redirect to {url}: {e}"));
                            HookResult::Error(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    };
                }
                Mapping::File(path) => {
                    // The last entry is used even if missing, a handler may still claim it
                    if i == last || tokio::fs::metadata(&path).await.is_ok() {
                        translated = Some(PathBuf::from(format!("{}{rest}", path.display())));
                        break;
                    }
                }
            }
        }

        match translated {
            Some(filename) => {
                logger::log_debug(&format!(
                    "UserDir {} -> {}",
                    ctx.uri,
                    filename.display()
                ));
                ctx.filename = Some(filename);
                HookResult::Handled(StatusCode::OK)
            }
            None => HookResult::Declined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::tests::context;
    use crate::scope::StartupConfig;
    use hyper::Method;

    #[test]
    fn test_map_entry_forms() {
        assert_eq!(
            map_entry("public_html", "joe", "/a.html"),
            Mapping::File(PathBuf::from("/home/joe/public_html"))
        );
        assert_eq!(
            map_entry("/usr/web", "joe", "/a.html"),
            Mapping::File(PathBuf::from("/usr/web/joe"))
        );
        assert_eq!(
            map_entry("/home/*/www", "joe", "/a.html"),
            Mapping::File(PathBuf::from("/home/joe/www"))
        );
        assert_eq!(
            map_entry("http://www.example.com/users/*/", "joe", "/a.html"),
            Mapping::Redirect("http://www.example.com/users/joe//a.html".to_string())
        );
        assert_eq!(
            map_entry("http://www.example.com/users", "joe", "/a.html"),
            Mapping::Redirect("http://www.example.com/users/joe/a.html".to_string())
        );
    }

    fn with_config(config: UserDirConfig, path: &str) -> RequestContext {
        let mut main = ServerBuilder::main(PathBuf::from("/srv/www"));
        main.modules.update::<UserDirConfig>(MODULE, |c| *c = config);
        let mut ctx = context(Method::GET, path);
        ctx.server = StartupConfig::new(main, Vec::new()).main;
        ctx
    }

    #[tokio::test]
    async fn test_translates_existing_dir() {
        let root = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*/site", root.path().display());
        std::fs::create_dir_all(root.path().join("joe/site")).unwrap();
        let config = UserDirConfig {
            dirs: Some(vec!["/nonexistent/*".to_string(), pattern]),
            ..UserDirConfig::default()
        };
        let mut ctx = with_config(config, "/~joe/index.html");
        assert_eq!(
            UserDir.translate_path(&mut ctx).await,
            HookResult::Handled(StatusCode::OK)
        );
        assert_eq!(
            ctx.filename,
            Some(root.path().join("joe/site/index.html"))
        );
    }

    #[tokio::test]
    async fn test_disabled_users() {
        let config = UserDirConfig {
            globally_disabled: true,
            enabled: vec!["ann".to_string()],
            ..UserDirConfig::default()
        };
        let mut ctx = with_config(config.clone(), "/~joe/");
        assert_eq!(UserDir.translate_path(&mut ctx).await, HookResult::Declined);
        let mut ctx = with_config(config, "/~ann/");
        assert_eq!(
            UserDir.translate_path(&mut ctx).await,
            HookResult::Handled(StatusCode::OK)
        );
        assert_eq!(
            ctx.filename,
            Some(PathBuf::from("/home/ann/public_html/"))
        );

        let config = UserDirConfig {
            disabled: vec!["root".to_string()],
            ..UserDirConfig::default()
        };
        let mut ctx = with_config(config, "/~root/");
        assert_eq!(UserDir.translate_path(&mut ctx).await, HookResult::Declined);
    }

    #[tokio::test]
    async fn test_url_entry_redirects() {
        let config = UserDirConfig {
            dirs: Some(vec!["http://people.example.com/*".to_string()]),
            ..UserDirConfig::default()
        };
        let mut ctx = with_config(config, "/~joe/cv.html");
        assert_eq!(
            UserDir.translate_path(&mut ctx).await,
            HookResult::Error(StatusCode::FOUND)
        );
        assert_eq!(
            ctx.headers_out[LOCATION],
            "http://people.example.com/joe/cv.html"
        );
    }

    #[tokio::test]
    async fn test_not_a_user_path() {
        let mut ctx = with_config(UserDirConfig::default(), "/docs/~joe");
        assert_eq!(UserDir.translate_path(&mut ctx).await, HookResult::Declined);
        let mut ctx = with_config(UserDirConfig::default(), "/~/x");
        assert_eq!(UserDir.translate_path(&mut ctx).await, HookResult::Declined);
    }
}
