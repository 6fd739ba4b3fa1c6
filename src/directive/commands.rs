//! Core directives
//!
//! Server-scoped directives write into the `ServerBuilder`; everything else
//! writes into the `DirConfig` of the scope being parsed.

use std::path::Path;

use super::{parse_flag, ArgSpec, Args, CmdParms, Container, Directive, Handler, Restrict};
use crate::http::method::MethodMask;
use crate::logger::{self, LogLevel};
use crate::scope::{
    DirConfig, HostnameLookups, Options, Override, RequireLine, Satisfy, ServerBuilder,
    ServerSignature,
};

const fn container(
    name: &'static str,
    kind: Container,
    allowed: Override,
    restrict: Restrict,
    help: &'static str,
) -> Directive {
    Directive {
        name,
        handler: Handler::Container(kind),
        allowed,
        restrict,
        args: ArgSpec::Raw,
        help,
    }
}

/// Directives owned by the core module
pub fn directives() -> Vec<Directive> {
    let section_restrict = Restrict::NOT_IN_DIR_LOC_FILE.and(Restrict::NOT_IN_LIMIT);
    let files_restrict = Restrict::NOT_IN_LIMIT
        .and(Restrict::NOT_IN_LOCATION)
        .and(Restrict::NOT_IN_FILES);
    let anywhere = Override::ALL | Override::RSRC_CONF | Override::ACCESS_CONF;
    let server_or_dir = Override::RSRC_CONF | Override::ACCESS_CONF;

    vec![
        // Containers
        container(
            "<Directory",
            Container::Directory,
            Override::RSRC_CONF,
            section_restrict,
            "Container for directives affecting resources located in the specified directories",
        ),
        container(
            "<DirectoryMatch",
            Container::DirectoryMatch,
            Override::RSRC_CONF,
            section_restrict,
            "Container for directives affecting directories matching a regular expression",
        ),
        container(
            "<Location",
            Container::Location,
            Override::RSRC_CONF,
            section_restrict,
            "Container for directives affecting resources accessed through the specified URL paths",
        ),
        container(
            "<LocationMatch",
            Container::LocationMatch,
            Override::RSRC_CONF,
            section_restrict,
            "Container for directives affecting URL paths matching a regular expression",
        ),
        container(
            "<Files",
            Container::Files,
            anywhere,
            files_restrict,
            "Container for directives affecting files matching specified patterns",
        ),
        container(
            "<FilesMatch",
            Container::FilesMatch,
            anywhere,
            files_restrict,
            "Container for directives affecting files matching a regular expression",
        ),
        container(
            "<Limit",
            Container::Limit,
            anywhere,
            Restrict::NOT_IN_LIMIT,
            "Container for authentication directives when accessed using specified HTTP methods",
        ),
        container(
            "<IfModule",
            Container::IfModule,
            anywhere,
            Restrict::NONE,
            "Container for directives based on existence of specified modules",
        ),
        container(
            "<VirtualHost",
            Container::VirtualHost,
            Override::RSRC_CONF,
            section_restrict,
            "Container to map directives to a particular virtual host",
        ),
        Directive {
            name: "Include",
            handler: Handler::Include,
            allowed: server_or_dir,
            restrict: Restrict::NONE,
            args: ArgSpec::Take1,
            help: "config file to be included",
        },
        // Server identity
        Directive::server(
            "DocumentRoot",
            set_document_root,
            ArgSpec::Take1,
            "Root directory of the document tree",
        )
        .restricted(section_restrict),
        Directive::server(
            "AccessFileName",
            set_access_file_name,
            ArgSpec::Take1,
            "Name of per-directory config files (default: .htaccess)",
        ),
        Directive::server(
            "ServerName",
            set_server_name,
            ArgSpec::Take1,
            "The hostname of the server",
        ),
        Directive::server(
            "ServerAdmin",
            set_server_admin,
            ArgSpec::Take1,
            "The email address of the server administrator",
        ),
        Directive::server("Port", set_port, ArgSpec::Take1, "A TCP port number"),
        Directive::server(
            "ServerAlias",
            set_server_alias,
            ArgSpec::OneOrMore,
            "A name or names alternately used to access the server",
        )
        .restricted(Restrict::VIRTUAL_ONLY),
        Directive::server(
            "LogLevel",
            set_log_level,
            ArgSpec::Take1,
            "set level of verbosity in error logging",
        )
        .restricted(Restrict::GLOBAL_ONLY),
        // Per-directory
        Directive::dir(
            "Options",
            set_options,
            Override::OPTIONS,
            ArgSpec::OneOrMore,
            "Set a number of attributes for a given directory",
        ),
        Directive::dir(
            "AllowOverride",
            set_allow_override,
            Override::ACCESS_CONF,
            ArgSpec::OneOrMore,
            "Controls what groups of directives can be configured by per-directory config files",
        )
        .restricted(Restrict::NOT_IN_LIMIT),
        Directive::dir(
            "DefaultType",
            set_default_type,
            Override::FILEINFO,
            ArgSpec::Take1,
            "the default MIME type for untypable files",
        ),
        Directive::dir(
            "ErrorDocument",
            set_error_document,
            Override::FILEINFO,
            ArgSpec::Raw,
            "Change responses for HTTP errors",
        )
        .restricted(Restrict::NOT_IN_LIMIT),
        Directive::dir(
            "AuthType",
            set_auth_type,
            Override::AUTHCFG,
            ArgSpec::Take1,
            "An HTTP authorization type (e.g., \"Basic\")",
        ),
        Directive::dir(
            "AuthName",
            set_auth_name,
            Override::AUTHCFG,
            ArgSpec::Take1,
            "The authentication realm (e.g. \"Members Only\")",
        ),
        Directive::dir(
            "Satisfy",
            set_satisfy,
            Override::AUTHCFG,
            ArgSpec::Take1,
            "access policy if both allow and require used ('all' or 'any')",
        ),
        Directive::dir(
            "Require",
            add_require,
            Override::AUTHCFG,
            ArgSpec::Raw,
            "Selects which authenticated users or groups may access a protected space",
        ),
        Directive::dir(
            "ServerSignature",
            set_server_signature,
            server_or_dir,
            ArgSpec::Take1,
            "En-/disable server signature (on|off|email)",
        )
        .restricted(Restrict::NOT_IN_LIMIT),
        Directive::dir(
            "HostnameLookups",
            set_hostname_lookups,
            server_or_dir,
            ArgSpec::Take1,
            "\"on\" to enable, \"off\" to disable reverse DNS lookups, or \"double\" to enable double-reverse DNS lookups",
        )
        .restricted(Restrict::NOT_IN_LIMIT),
        Directive::dir(
            "ContentDigest",
            set_content_digest,
            server_or_dir | Override::AUTHCFG,
            ArgSpec::Flag,
            "whether or not to send a Content-MD5 header with each request",
        ),
        Directive::dir(
            "UseCanonicalName",
            set_use_canonical_name,
            server_or_dir | Override::AUTHCFG,
            ArgSpec::Flag,
            "How to work out the ServerName : Port when constructing URLs",
        ),
    ]
}

fn set_document_root(
    parms: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    let path = resolve(parms.server_root, args.first());
    if !path.is_dir() {
        if !parms.in_virtual {
            return Err("DocumentRoot must be a directory".to_string());
        }
        logger::log_warning(&format!(
            "DocumentRoot [{}] does not exist",
            path.display()
        ));
    }
    server.document_root = Some(path);
    Ok(())
}

fn resolve(root: &Path, arg: &str) -> std::path::PathBuf {
    let path = Path::new(arg);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn set_access_file_name(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    server.access_file_name = Some(args.first().to_string());
    Ok(())
}

fn set_server_name(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    server.server_name = Some(args.first().to_string());
    Ok(())
}

fn set_server_admin(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    server.admin = Some(args.first().to_string());
    Ok(())
}

fn set_port(_: &CmdParms<'_>, server: &mut ServerBuilder, args: &Args<'_>) -> Result<(), String> {
    let word = args.first();
    match word.parse::<u16>() {
        Ok(port) if port > 0 => {
            server.port = Some(port);
            Ok(())
        }
        _ => Err(format!(
            "The port number \"{word}\" is outside the appropriate range (i.e., 1..65535)."
        )),
    }
}

fn set_server_alias(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    server.aliases.extend(args.words.iter().cloned());
    Ok(())
}

fn set_log_level(
    _: &CmdParms<'_>,
    server: &mut ServerBuilder,
    args: &Args<'_>,
) -> Result<(), String> {
    let level = LogLevel::from_keyword(args.first()).ok_or_else(|| {
        "LogLevel requires level keyword: one of emerg/alert/crit/error/warn/notice/info/debug"
            .to_string()
    })?;
    server.log_level = Some(level);
    Ok(())
}

fn set_options(_: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    let mut first = true;
    for word in &args.words {
        let (action, keyword) = match word.as_bytes().first() {
            Some(b'+') => (Some(true), &word[1..]),
            Some(b'-') => (Some(false), &word[1..]),
            _ => (None, word.as_str()),
        };
        if action.is_none() && first {
            dir.options.reset();
            first = false;
        }
        let opt = Options::from_keyword(keyword).ok_or_else(|| format!("Illegal option {keyword}"))?;
        match action {
            Some(true) => dir.options.enable(opt),
            Some(false) => dir.options.disable(opt),
            None => dir.options.set(opt),
        }
    }
    Ok(())
}

fn set_allow_override(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    let mut value = Override::NONE;
    for word in &args.words {
        let category = Override::from_keyword(word)
            .ok_or_else(|| format!("Illegal override option {word}"))?;
        if category.is_none() {
            value = Override::NONE;
        } else {
            value |= category;
        }
    }
    dir.allow_override = Some(value);
    Ok(())
}

fn set_default_type(_: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    dir.default_type = Some(args.first().to_string());
    Ok(())
}

/// `ErrorDocument <code> <url | "text>`, a leading quote marks literal text
fn set_error_document(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    let raw = args.raw.trim();
    let (code, document) = raw
        .split_once(char::is_whitespace)
        .map(|(code, rest)| (code, rest.trim_start()))
        .unwrap_or((raw, ""));
    let status = code
        .parse::<u16>()
        .ok()
        .filter(|s| (100..=599).contains(s))
        .ok_or_else(|| format!("Unsupported HTTP response code {code}"))?;
    if document.is_empty() {
        return Err("ErrorDocument takes two arguments, Change responses for HTTP errors".to_string());
    }
    dir.error_documents.insert(status, document.to_string());
    Ok(())
}

fn set_auth_type(_: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    dir.auth_type = Some(args.first().to_string());
    Ok(())
}

fn set_auth_name(_: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    dir.auth_name = Some(args.first().to_string());
    Ok(())
}

fn set_satisfy(_: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    let satisfy = match args.first().to_ascii_lowercase().as_str() {
        "all" => Satisfy::All,
        "any" => Satisfy::Any,
        _ => return Err("Satisfy either 'any' or 'all'.".to_string()),
    };
    dir.satisfy = Some(satisfy);
    Ok(())
}

/// Each line is kept with the methods of the enclosing `<Limit>`
fn add_require(parms: &CmdParms<'_>, dir: &mut DirConfig, args: &Args<'_>) -> Result<(), String> {
    let requirement = args.raw.trim();
    if requirement.is_empty() {
        return Err("Require requires arguments".to_string());
    }
    dir.requires.push(RequireLine {
        methods: parms.limit.unwrap_or(MethodMask::ALL),
        requirement: requirement.to_string(),
    });
    Ok(())
}

fn set_server_signature(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    let signature = match args.first().to_ascii_lowercase().as_str() {
        "on" => ServerSignature::On,
        "off" => ServerSignature::Off,
        "email" => ServerSignature::Email,
        _ => return Err("ServerSignature: use one of: off | on | email".to_string()),
    };
    dir.server_signature = Some(signature);
    Ok(())
}

fn set_hostname_lookups(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    let lookups = match args.first().to_ascii_lowercase().as_str() {
        "on" => HostnameLookups::On,
        "off" => HostnameLookups::Off,
        "double" => HostnameLookups::Double,
        _ => return Err("parameter must be 'on', 'off', or 'double'".to_string()),
    };
    dir.hostname_lookups = Some(lookups);
    Ok(())
}

fn set_content_digest(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    dir.content_md5 = parse_flag(args.first());
    Ok(())
}

fn set_use_canonical_name(
    _: &CmdParms<'_>,
    dir: &mut DirConfig,
    args: &Args<'_>,
) -> Result<(), String> {
    dir.use_canonical_name = parse_flag(args.first());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{ConfigParser, DirectiveTable};
    use crate::error::ConfigError;
    use crate::scope::StartupConfig;

    fn parse(text: &str) -> Result<StartupConfig, ConfigError> {
        let table = DirectiveTable::new(directives());
        let parser = ConfigParser::new(&table, &["core"], "/srv/root");
        parser.parse_str("httpd.conf", text)
    }

    fn defaults(text: &str) -> DirConfig {
        parse(text).unwrap().main.defaults.clone()
    }

    #[test]
    fn test_options_bare_word_resets() {
        let dir = defaults("Options Indexes FollowSymLinks\n");
        assert!(dir.options.explicit);
        assert_eq!(dir.options.value, Options::INDEXES | Options::SYM_LINKS);
    }

    #[test]
    fn test_options_relative_words() {
        let dir = defaults("Options +ExecCGI -Indexes\n");
        assert!(dir.options.value.contains(Options::EXEC_CGI));
        assert!(!dir.options.value.contains(Options::INDEXES));
        assert!(dir.options.remove.contains(Options::INDEXES));
        assert!(dir.options.add.contains(Options::EXEC_CGI));

        let err = parse("Options Bogus\n").unwrap_err();
        assert!(err.to_string().contains("Illegal option Bogus"));
    }

    #[test]
    fn test_allow_override_words() {
        let startup = parse("<Directory />\nAllowOverride AuthConfig Limit\n</Directory>\n").unwrap();
        let section = startup.main.directories.iter().next().unwrap();
        assert_eq!(
            section.config.allow_override,
            Some(Override::AUTHCFG | Override::LIMIT)
        );

        let err = parse("<Directory />\nAllowOverride Everything\n</Directory>\n").unwrap_err();
        assert!(err.to_string().contains("Illegal override option Everything"));
    }

    #[test]
    fn test_port_range() {
        let startup = parse("Port 8081\n").unwrap();
        assert_eq!(startup.main.port, 8081);
        let err = parse("Port 70000\n").unwrap_err();
        assert!(err
            .to_string()
            .contains("The port number \"70000\" is outside the appropriate range (i.e., 1..65535)."));
        assert!(parse("Port 0\n").is_err());
    }

    #[test]
    fn test_document_root_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let startup = parse(&format!("DocumentRoot \"{}\"\n", dir.path().display())).unwrap();
        assert_eq!(startup.main.document_root, dir.path());

        let err = parse("DocumentRoot /no/such/dir/anywhere\n").unwrap_err();
        assert!(err.to_string().contains("DocumentRoot must be a directory"));

        // Only a warning inside a virtual host
        assert!(parse("<VirtualHost *>\nDocumentRoot /no/such/dir/anywhere\n</VirtualHost>\n").is_ok());
    }

    #[test]
    fn test_error_document() {
        let dir = defaults("ErrorDocument 404 /missing.html\nErrorDocument 500 \"Server is sad\n");
        assert_eq!(dir.error_documents.get(&404).map(String::as_str), Some("/missing.html"));
        assert_eq!(
            dir.error_documents.get(&500).map(String::as_str),
            Some("\"Server is sad")
        );
        assert!(parse("ErrorDocument 99 /x\n").is_err());
    }

    #[test]
    fn test_flags_and_keywords() {
        let dir = defaults(
            "ContentDigest On\nUseCanonicalName off\nServerSignature email\nHostnameLookups double\nDefaultType application/octet-stream\n",
        );
        assert_eq!(dir.content_md5, Some(true));
        assert_eq!(dir.use_canonical_name, Some(false));
        assert_eq!(dir.server_signature, Some(ServerSignature::Email));
        assert_eq!(dir.hostname_lookups, Some(HostnameLookups::Double));
        assert_eq!(dir.default_type.as_deref(), Some("application/octet-stream"));

        let err = parse("ContentDigest maybe\n").unwrap_err();
        assert!(err.to_string().contains("must be On or Off"));
        let err = parse("<Directory />\nSatisfy some\n</Directory>\n").unwrap_err();
        assert!(err.to_string().contains("Satisfy either 'any' or 'all'."));
    }

    #[test]
    fn test_log_level_recorded() {
        let startup = parse("LogLevel warn\n").unwrap();
        assert_eq!(startup.log_level, Some(LogLevel::Warn));
    }
}
