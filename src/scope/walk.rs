//! Per-request configuration walk
//!
//! Directory sections level by level from the root, with override files
//! read where permitted, then special and regex directory sections, then
//! Location sections against the URI, then Files sections against the final
//! path segment.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::dir_config::{merge, DirConfig, EffectiveConfig};
use super::options::Override;
use super::section::{count_components, leading_components};
use super::server::ServerIdentity;
use crate::directive::{ConfigParser, LineSource};
use crate::error::{ConfigError, RequestConfigError, ResourceError};
use crate::logger;

/// Result of splitting a translated filename into file and path info
#[derive(Debug)]
pub struct Located {
    pub filename: PathBuf,
    pub path_info: String,
    pub metadata: Option<std::fs::Metadata>,
}

impl Located {
    pub fn is_dir(&self) -> bool {
        self.metadata.as_ref().is_some_and(std::fs::Metadata::is_dir)
    }
}

/// Longest existing prefix of `filename` is the file; the rest is path info
///
/// A directory followed by more path is a dead end and resolves to nothing.
pub async fn locate(filename: &Path) -> Result<Located, ResourceError> {
    let full = filename.to_string_lossy().into_owned();
    let mut end = full.len();
    loop {
        let candidate = &full[..end];
        match tokio::fs::metadata(candidate).await {
            Ok(meta) => {
                let rest = &full[end..];
                if meta.is_dir() && !rest.is_empty() {
                    break;
                }
                return Ok(Located {
                    filename: PathBuf::from(candidate),
                    path_info: rest.to_string(),
                    metadata: Some(meta),
                });
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                logger::log_error(&format!("access to {candidate} failed: {e}"));
                return Err(ResourceError::Forbidden);
            }
            Err(_) => {}
        }
        match candidate.rfind('/') {
            Some(idx) if idx > 0 => end = idx,
            _ => break,
        }
    }
    Ok(Located {
        filename: PathBuf::from(full),
        path_info: String::new(),
        metadata: None,
    })
}

/// What the walk needs to know about the request
#[derive(Debug, Clone, Copy)]
pub struct WalkTarget<'a> {
    /// Translated filename, `None` for requests not mapped to the filesystem
    pub filename: Option<&'a Path>,
    pub is_dir: bool,
    pub uri: &'a str,
}

/// Build the effective configuration for one request
pub async fn resolve(
    server: &ServerIdentity,
    parser: &ConfigParser<'_>,
    target: WalkTarget<'_>,
) -> Result<EffectiveConfig, RequestConfigError> {
    let mut config = server.defaults.clone();

    let filename = target
        .filename
        .map(|f| f.to_string_lossy().into_owned())
        .filter(|f| f.starts_with('/'));
    if let Some(filename) = &filename {
        config = walk_directories(server, parser, filename, target.is_dir, config).await?;
    }

    for section in server.locations.applicable(target.uri) {
        config = merge(&config, &section.config);
    }

    let name = target
        .filename
        .and_then(Path::file_name)
        .and_then(|n| n.to_str());
    if let Some(name) = name {
        let files: Vec<_> = config
            .files
            .iter()
            .filter(|s| s.matches_name(name))
            .cloned()
            .collect();
        for section in files {
            config = merge(&config, &section.config);
        }
    }

    Ok(EffectiveConfig::new(config))
}

/// Slash-terminated directory the walk descends to
fn walk_directory(filename: &str, is_dir: bool) -> String {
    if is_dir {
        let mut dir = filename.to_string();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        return dir;
    }
    match filename.rfind('/') {
        Some(idx) => filename[..=idx].to_string(),
        None => "/".to_string(),
    }
}

async fn walk_directories(
    server: &ServerIdentity,
    parser: &ConfigParser<'_>,
    filename: &str,
    is_dir: bool,
    mut config: DirConfig,
) -> Result<DirConfig, RequestConfigError> {
    let dir = walk_directory(filename, is_dir);
    let levels = count_components(&dir);

    for level in 1..=levels {
        let Some(prefix) = leading_components(&dir, level) else {
            break;
        };
        for section in server
            .directories
            .iter()
            .filter(|s| !s.special && s.specificity == level && s.matches_path(prefix))
        {
            config = merge(&config, &section.config);
        }

        let allowed = config.allow_override.unwrap_or(Override::NONE);
        if !allowed.is_none() {
            if let Some(overlay) =
                read_override(parser, prefix, &server.access_file_name, allowed).await?
            {
                config = merge(&config, &overlay);
            }
        }
    }

    let subject = if is_dir { dir.as_str() } else { filename };
    for section in server
        .directories
        .iter()
        .filter(|s| s.special && s.matches_path(subject))
    {
        config = merge(&config, &section.config);
    }
    Ok(config)
}

async fn read_override(
    parser: &ConfigParser<'_>,
    dir: &str,
    name: &str,
    allowed: Override,
) -> Result<Option<DirConfig>, RequestConfigError> {
    let path = PathBuf::from(format!("{dir}{name}"));
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(None);
        }
        Err(source) => {
            return Err(RequestConfigError {
                path: path.clone(),
                source: ConfigError::Io { path, source },
            });
        }
    };
    logger::log_debug(&format!("Applying override file {}", path.display()));
    let mut src = LineSource::new(path.display().to_string(), &text);
    parser
        .parse_override(&mut src, allowed, dir)
        .map(Some)
        .map_err(|source| RequestConfigError { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{commands, DirectiveTable};
    use crate::scope::{Options, StartupConfig};

    fn startup(table: &DirectiveTable, text: &str) -> StartupConfig {
        ConfigParser::new(table, &["core"], "/")
            .parse_str("httpd.conf", text)
            .unwrap()
    }

    #[test]
    fn test_walk_directory() {
        assert_eq!(walk_directory("/var/www/index.html", false), "/var/www/");
        assert_eq!(walk_directory("/var/www", true), "/var/www/");
        assert_eq!(walk_directory("/var/www/", true), "/var/www/");
    }

    #[tokio::test]
    async fn test_locate_splits_path_info() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("script.txt"), "x").unwrap();

        let located = locate(&root.path().join("script.txt/extra/info")).await.unwrap();
        assert_eq!(located.filename, root.path().join("script.txt"));
        assert_eq!(located.path_info, "/extra/info");
        assert!(located.metadata.is_some());

        let located = locate(&root.path().join("missing/deeper")).await.unwrap();
        assert!(located.metadata.is_none());
        assert!(located.path_info.is_empty());

        std::fs::create_dir(root.path().join("sub")).unwrap();
        let located = locate(&root.path().join("sub/nothing")).await.unwrap();
        assert!(located.metadata.is_none());
    }

    #[tokio::test]
    async fn test_sections_applied_broadest_first() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().display().to_string();
        std::fs::create_dir_all(root.path().join("docs/private")).unwrap();
        std::fs::write(root.path().join("docs/private/a.html"), "a").unwrap();

        let table = DirectiveTable::new(commands::directives());
        let conf = format!(
            "<Directory />\nAllowOverride None\nOptions None\n</Directory>\n\
             <Directory {base}/docs/private>\nDefaultType text/x-private\n</Directory>\n\
             <Directory {base}/docs>\nOptions Indexes\nDefaultType text/x-docs\n</Directory>\n\
             <Location /private>\nOptions +FollowSymLinks\n</Location>\n\
             <Files a.html>\nDefaultType text/x-file\n</Files>\n"
        );
        let startup = startup(&table, &conf);
        let parser = ConfigParser::new(&table, &["core"], "/");

        let filename = root.path().join("docs/private/a.html");
        let effective = resolve(
            &startup.main,
            &parser,
            WalkTarget {
                filename: Some(&filename),
                is_dir: false,
                uri: "/private/a.html",
            },
        )
        .await
        .unwrap();
        assert_eq!(effective.default_type(), "text/x-file");
        assert_eq!(effective.options(), Options::INDEXES | Options::SYM_LINKS);

        let other = root.path().join("docs/private/b.txt");
        let effective = resolve(
            &startup.main,
            &parser,
            WalkTarget {
                filename: Some(&other),
                is_dir: false,
                uri: "/docs/b.txt",
            },
        )
        .await
        .unwrap();
        assert_eq!(effective.default_type(), "text/x-private");
        assert_eq!(effective.options(), Options::INDEXES);
    }

    #[tokio::test]
    async fn test_override_files_respect_allow_override() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().display().to_string();
        std::fs::create_dir_all(root.path().join("open/closed/deep")).unwrap();
        std::fs::write(
            root.path().join("open/.htaccess"),
            "DefaultType text/x-open\n",
        )
        .unwrap();
        std::fs::write(
            root.path().join("open/closed/deep/.htaccess"),
            "DefaultType text/x-deep\n",
        )
        .unwrap();

        let table = DirectiveTable::new(commands::directives());
        let conf = format!(
            "<Directory />\nAllowOverride None\n</Directory>\n\
             <Directory {base}/open>\nAllowOverride FileInfo\n</Directory>\n\
             <Directory {base}/open/closed>\nAllowOverride None\n</Directory>\n"
        );
        let startup = startup(&table, &conf);
        let parser = ConfigParser::new(&table, &["core"], "/");

        let file = root.path().join("open/closed/deep/x.bin");
        let effective = resolve(
            &startup.main,
            &parser,
            WalkTarget {
                filename: Some(&file),
                is_dir: false,
                uri: "/x.bin",
            },
        )
        .await
        .unwrap();
        // Inherited from the open level, the deep override is never read
        assert_eq!(effective.default_type(), "text/x-open");
        assert!(effective.allow_override().is_none());
    }

    #[tokio::test]
    async fn test_disallowed_override_fails_request() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().display().to_string();
        std::fs::write(root.path().join(".htaccess"), "Options +ExecCGI\n").unwrap();

        let table = DirectiveTable::new(commands::directives());
        let conf = format!(
            "<Directory />\nAllowOverride None\n</Directory>\n\
             <Directory {base}>\nAllowOverride AuthConfig\n</Directory>\n"
        );
        let startup = startup(&table, &conf);
        let parser = ConfigParser::new(&table, &["core"], "/");

        let file = root.path().join("index.html");
        let err = resolve(
            &startup.main,
            &parser,
            WalkTarget {
                filename: Some(&file),
                is_dir: false,
                uri: "/index.html",
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.path, root.path().join(".htaccess"));
        assert!(matches!(err.source, ConfigError::NotAllowedHere { .. }));
    }
}
