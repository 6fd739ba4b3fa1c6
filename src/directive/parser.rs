//! Directive file parser
//!
//! Containers recurse: each nested block gets its own `Scope` (allowed
//! contexts, enclosing `<Limit>`, enclosing section) and its own target
//! `DirConfig`, while the server being configured is passed down explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ArgSpec, Args, CmdParms, Container, Directive, DirectiveTable, Handler, Restrict};
use crate::error::ConfigError;
use crate::http::method::{MethodMask, MethodNumber};
use crate::scope::{
    DirConfig, Override, Pattern, ScopeSection, SectionKind, ServerBuilder, StartupConfig,
};

const MAX_INCLUDE_DEPTH: usize = 16;

/// Logical lines of one configuration file
#[derive(Debug)]
pub struct LineSource {
    name: String,
    lines: Vec<(usize, String)>,
    pos: usize,
}

impl LineSource {
    /// Join `\` continuations, drop blank lines and `#` comments
    pub fn new(name: impl Into<String>, text: &str) -> Self {
        let mut lines = Vec::new();
        let mut pending: Option<(usize, String)> = None;
        for (idx, raw) in text.lines().enumerate() {
            let (start, mut buf) = pending.take().unwrap_or((idx + 1, String::new()));
            buf.push_str(raw);
            if buf.ends_with('\\') {
                buf.pop();
                pending = Some((start, buf));
                continue;
            }
            push_logical(&mut lines, start, &buf);
        }
        if let Some((start, buf)) = pending {
            push_logical(&mut lines, start, &buf);
        }
        Self {
            name: name.into(),
            lines,
            pos: 0,
        }
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), &text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_line(&mut self) -> Option<(usize, String)> {
        let line = self.lines.get(self.pos).cloned();
        self.pos += 1;
        line
    }

    fn syntax(&self, line: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Syntax {
            file: self.name.clone(),
            line,
            message: message.into(),
        }
    }
}

fn push_logical(lines: &mut Vec<(usize, String)>, start: usize, buf: &str) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('#') {
        lines.push((start, trimmed.to_string()));
    }
}

/// Split arguments on whitespace, honoring single and double quotes
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut word = String::new();
        if first == '"' || first == '\'' {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '\\' && chars.peek() == Some(&first) {
                    word.push(first);
                    chars.next();
                } else if c == first {
                    break;
                } else {
                    word.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
        }
        words.push(word);
    }
    words
}

/// Directive name and the rest of the line
fn split_directive(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

/// Where in the configuration a block is being parsed
#[derive(Debug, Clone, Copy)]
struct Scope<'p> {
    allowed: Override,
    limit: Option<MethodMask>,
    in_virtual: bool,
    section: Option<SectionKind>,
    path: Option<&'p str>,
}

#[derive(Debug, Default)]
struct ParseState {
    virtual_hosts: Vec<ServerBuilder>,
    include_depth: usize,
}

pub struct ConfigParser<'a> {
    table: &'a DirectiveTable,
    modules: Vec<String>,
    server_root: PathBuf,
}

impl<'a> ConfigParser<'a> {
    pub fn new(table: &'a DirectiveTable, modules: &[&str], server_root: impl Into<PathBuf>) -> Self {
        Self {
            table,
            modules: modules.iter().map(|m| normalize_module(m)).collect(),
            server_root: server_root.into(),
        }
    }

    /// Parse the main directive file into the frozen startup configuration
    pub fn parse_file(&self, path: &Path) -> Result<StartupConfig, ConfigError> {
        let src = LineSource::read(path)?;
        self.parse_source(src)
    }

    pub fn parse_str(&self, name: &str, text: &str) -> Result<StartupConfig, ConfigError> {
        self.parse_source(LineSource::new(name, text))
    }

    fn parse_source(&self, mut src: LineSource) -> Result<StartupConfig, ConfigError> {
        let mut main = ServerBuilder::main(self.server_root.join("htdocs"));
        let mut defaults = std::mem::take(&mut main.defaults);
        let mut state = ParseState::default();
        let scope = Scope {
            allowed: Override::RSRC_CONF | Override::ALL,
            limit: None,
            in_virtual: false,
            section: None,
            path: None,
        };
        self.parse_block(&mut src, scope, Some(&mut main), &mut defaults, &mut state, None)?;
        main.defaults = defaults;
        Ok(StartupConfig::new(main, state.virtual_hosts))
    }

    /// Parse an override file found in `dir_path`, limited to `allowed` categories
    pub fn parse_override(
        &self,
        src: &mut LineSource,
        allowed: Override,
        dir_path: &str,
    ) -> Result<DirConfig, ConfigError> {
        let mut dir = DirConfig::default();
        let scope = Scope {
            allowed: allowed & Override::ALL,
            limit: None,
            in_virtual: false,
            section: None,
            path: Some(dir_path),
        };
        self.parse_block(src, scope, None, &mut dir, &mut ParseState::default(), None)?;
        Ok(dir)
    }

    fn parse_block(
        &self,
        src: &mut LineSource,
        scope: Scope<'_>,
        mut server: Option<&mut ServerBuilder>,
        dir: &mut DirConfig,
        state: &mut ParseState,
        end: Option<&str>,
    ) -> Result<(), ConfigError> {
        while let Some((line, text)) = src.next_line() {
            let (mut name, mut rest) = split_directive(&text);
            if name.starts_with("</") {
                return close_block(src, line, name, end);
            }
            if name.starts_with('<') && name.ends_with('>') {
                name = &name[..name.len() - 1];
                rest = ">";
            }

            let directive = *self.table.get(name).ok_or_else(|| {
                src.syntax(
                    line,
                    format!(
                        "Invalid command '{name}', perhaps mis-spelled or defined by a module not included in the server configuration"
                    ),
                )
            })?;
            check_context(&directive, &scope).map_err(|e| e.at(src, line))?;

            let parms = CmdParms {
                directive: directive.name,
                limit: scope.limit,
                path: scope.path,
                server_root: &self.server_root,
                in_virtual: scope.in_virtual,
            };

            match directive.handler {
                Handler::Container(kind) => {
                    let Some(inner) = rest.trim_end().strip_suffix('>') else {
                        return Err(src.syntax(
                            line,
                            format!("{}> directive missing closing '>'", directive.name),
                        ));
                    };
                    let words = split_words(inner);
                    self.container(
                        kind,
                        &directive,
                        &words,
                        src,
                        line,
                        scope,
                        server.as_deref_mut(),
                        dir,
                        state,
                    )?;
                }
                Handler::Include => {
                    let args = check_args(&directive, rest).map_err(|e| e.at(src, line))?;
                    self.include(args.first(), src, line, scope, server.as_deref_mut(), dir, state)?;
                }
                Handler::Dir(apply) => {
                    let args = check_args(&directive, rest).map_err(|e| e.at(src, line))?;
                    apply(&parms, dir, &args).map_err(|message| src.syntax(line, message))?;
                }
                Handler::Server(apply) => {
                    let Some(target) = server.as_deref_mut() else {
                        return Err(not_allowed(src, line, directive.name));
                    };
                    let args = check_args(&directive, rest).map_err(|e| e.at(src, line))?;
                    apply(&parms, target, &args).map_err(|message| src.syntax(line, message))?;
                }
            }
        }

        match end {
            Some(closer) => Err(ConfigError::MissingEndSection {
                file: src.name.clone(),
                closer: closer.to_string(),
            }),
            None => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn container(
        &self,
        kind: Container,
        directive: &Directive,
        words: &[String],
        src: &mut LineSource,
        line: usize,
        scope: Scope<'_>,
        server: Option<&mut ServerBuilder>,
        dir: &mut DirConfig,
        state: &mut ParseState,
    ) -> Result<(), ConfigError> {
        let closer = format!("</{}>", &directive.name[1..]);
        match kind {
            Container::Limit => {
                if words.is_empty() {
                    return Err(src.syntax(line, "<Limit> requires at least one method"));
                }
                let mut mask = MethodMask::NONE;
                for word in words {
                    let method = MethodNumber::from_token(word).ok_or_else(|| {
                        src.syntax(line, format!("unknown method \"{word}\" in <Limit>"))
                    })?;
                    mask = mask.with(method);
                }
                let inner = Scope {
                    limit: Some(mask),
                    ..scope
                };
                self.parse_block(src, inner, server, dir, state, Some(&closer))
            }
            Container::IfModule => {
                let [arg] = words else {
                    return Err(src.syntax(line, "<IfModule> takes exactly one argument"));
                };
                let (negate, module) = arg
                    .strip_prefix('!')
                    .map_or((false, arg.as_str()), |m| (true, m));
                if self.has_module(module) == negate {
                    return skip_block(src, &closer);
                }
                self.parse_block(src, scope, server, dir, state, Some(&closer))
            }
            Container::VirtualHost => {
                if scope.in_virtual {
                    return Err(src.syntax(line, "<VirtualHost> doesn't nest!"));
                }
                if words.is_empty() {
                    return Err(src.syntax(line, "<VirtualHost> requires at least one address"));
                }
                let mut vhost = ServerBuilder::virtual_host(words.to_vec());
                let mut defaults = std::mem::take(&mut vhost.defaults);
                let inner = Scope {
                    in_virtual: true,
                    ..scope
                };
                self.parse_block(src, inner, Some(&mut vhost), &mut defaults, state, Some(&closer))?;
                vhost.defaults = defaults;
                state.virtual_hosts.push(vhost);
                Ok(())
            }
            _ => self.section(kind, directive, words, src, line, scope, server, dir, state, &closer),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn section(
        &self,
        kind: Container,
        directive: &Directive,
        words: &[String],
        src: &mut LineSource,
        line: usize,
        scope: Scope<'_>,
        mut server: Option<&mut ServerBuilder>,
        dir: &mut DirConfig,
        state: &mut ParseState,
        closer: &str,
    ) -> Result<(), ConfigError> {
        let section_kind = match kind {
            Container::Directory => SectionKind::Directory,
            Container::DirectoryMatch => SectionKind::DirectoryMatch,
            Container::Location => SectionKind::Location,
            Container::LocationMatch => SectionKind::LocationMatch,
            Container::FilesMatch => SectionKind::FilesMatch,
            _ => SectionKind::Files,
        };
        let is_match_kind = matches!(
            section_kind,
            SectionKind::DirectoryMatch | SectionKind::LocationMatch | SectionKind::FilesMatch
        );

        let (raw, regex, extra) = match words {
            [tilde, re, rest @ ..] if tilde == "~" && !is_match_kind => (re.as_str(), true, rest.len()),
            [first, rest @ ..] => (first.as_str(), is_match_kind, rest.len()),
            [] => {
                return Err(src.syntax(line, format!("{}> takes one argument", directive.name)));
            }
        };
        if extra > 0 {
            return Err(src.syntax(
                line,
                format!("Multiple {}> arguments not (yet) supported.", directive.name),
            ));
        }

        let pattern = if regex {
            Pattern::regex(section_kind, raw)
        } else {
            Pattern::literal(section_kind, raw)
        }
        .map_err(|source| ConfigError::Regex {
            file: src.name.clone(),
            line,
            pattern: raw.to_string(),
            source,
        })?;

        let inner_allowed = if scope
            .allowed
            .intersects(Override::RSRC_CONF | Override::ACCESS_CONF)
        {
            Override::ACCESS_CONF | Override::ALL
        } else {
            scope.allowed
        };
        let pattern_text = pattern.as_str().to_string();
        let inner = Scope {
            allowed: inner_allowed,
            section: Some(section_kind),
            path: Some(&pattern_text),
            ..scope
        };

        let mut config = DirConfig::default();
        self.parse_block(src, inner, server.as_deref_mut(), &mut config, state, Some(closer))?;
        let section = Arc::new(ScopeSection::new(section_kind, pattern, config));

        if section_kind.is_files() {
            dir.files.push(section);
            return Ok(());
        }
        let Some(server) = server else {
            return Err(not_allowed(src, line, directive.name));
        };
        match section_kind {
            SectionKind::Location | SectionKind::LocationMatch => server.locations.push(section),
            _ => server.directories.push(section),
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn include(
        &self,
        file: &str,
        src: &LineSource,
        line: usize,
        scope: Scope<'_>,
        server: Option<&mut ServerBuilder>,
        dir: &mut DirConfig,
        state: &mut ParseState,
    ) -> Result<(), ConfigError> {
        if state.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(src.syntax(line, format!("Include of {file} nested too deeply")));
        }
        let path = Path::new(file);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.server_root.join(path)
        };
        let mut included = LineSource::read(&path)?;
        state.include_depth += 1;
        let result = self.parse_block(&mut included, scope, server, dir, state, None);
        state.include_depth -= 1;
        result
    }

    fn has_module(&self, name: &str) -> bool {
        let wanted = normalize_module(name);
        self.modules.iter().any(|m| *m == wanted)
    }
}

/// Module names compare without a `mod_` prefix or `.c` suffix
fn normalize_module(name: &str) -> String {
    let name = name.trim_end_matches(".c");
    name.strip_prefix("mod_")
        .unwrap_or(name)
        .to_ascii_lowercase()
}

fn close_block(src: &LineSource, line: usize, name: &str, end: Option<&str>) -> Result<(), ConfigError> {
    let closer = if name.ends_with('>') {
        name.to_string()
    } else {
        format!("{name}>")
    };
    match end {
        Some(expected) if expected.eq_ignore_ascii_case(&closer) => Ok(()),
        Some(expected) => Err(ConfigError::UnexpectedEndSection {
            file: src.name.clone(),
            line,
            message: format!("Expected {expected} but saw {closer}"),
        }),
        None if closer.eq_ignore_ascii_case("</Limit>") => Err(ConfigError::UnexpectedEndSection {
            file: src.name.clone(),
            line,
            message: "</Limit> unexpected".to_string(),
        }),
        None => Err(ConfigError::UnexpectedEndSection {
            file: src.name.clone(),
            line,
            message: format!("{closer} without matching <{} section", &closer[2..closer.len() - 1]),
        }),
    }
}

/// Skip a disabled `<IfModule>` body, honoring nesting
fn skip_block(src: &mut LineSource, closer: &str) -> Result<(), ConfigError> {
    let mut depth = 0usize;
    while let Some((_, text)) = src.next_line() {
        let (name, _) = split_directive(&text);
        let name = name.trim_end_matches('>');
        if name.eq_ignore_ascii_case("<IfModule") {
            depth += 1;
        } else if name.eq_ignore_ascii_case("</IfModule") {
            if depth == 0 {
                return Ok(());
            }
            depth -= 1;
        }
    }
    Err(ConfigError::MissingEndSection {
        file: src.name.clone(),
        closer: closer.to_string(),
    })
}

/// Context violation before the file position is attached
enum ContextError {
    NotAllowed(String),
    Message(String),
    Args { directive: String, message: String },
}

impl ContextError {
    fn at(self, src: &LineSource, line: usize) -> ConfigError {
        match self {
            Self::NotAllowed(directive) => ConfigError::NotAllowedHere {
                file: src.name.clone(),
                line,
                directive,
            },
            Self::Message(message) => src.syntax(line, message),
            Self::Args { directive, message } => ConfigError::Directive {
                file: src.name.clone(),
                line,
                directive,
                message,
            },
        }
    }
}

fn display_name(directive: &Directive) -> String {
    if directive.name.starts_with('<') {
        format!("{}>", directive.name)
    } else {
        directive.name.to_string()
    }
}

fn not_allowed(src: &LineSource, line: usize, name: &str) -> ConfigError {
    ConfigError::NotAllowedHere {
        file: src.name.clone(),
        line,
        directive: name.to_string(),
    }
}

fn check_context(directive: &Directive, scope: &Scope<'_>) -> Result<(), ContextError> {
    if !directive.allowed.intersects(scope.allowed) {
        return Err(ContextError::NotAllowed(directive.name.to_string()));
    }
    let r = directive.restrict;
    let name = display_name(directive);
    let within = |section: &str| {
        Err(ContextError::Message(format!(
            "{name} cannot occur within <{section}> section"
        )))
    };
    if r.has(Restrict::NOT_IN_VIRTUALHOST) && scope.in_virtual {
        return within("VirtualHost");
    }
    if r.has(Restrict::NOT_IN_LIMIT) && scope.limit.is_some() {
        return within("Limit");
    }
    if r.has(Restrict::NOT_IN_DIR_LOC_FILE) && scope.path.is_some() {
        return within("Directory/Location/Files");
    }
    if r.has(Restrict::NOT_IN_LOCATION)
        && matches!(
            scope.section,
            Some(SectionKind::Location | SectionKind::LocationMatch)
        )
    {
        return within("Location");
    }
    if r.has(Restrict::NOT_IN_FILES) && scope.section.is_some_and(SectionKind::is_files) {
        return within("Files");
    }
    if r.has(Restrict::VIRTUAL_ONLY) && !scope.in_virtual {
        return Err(ContextError::Message(format!(
            "{name} only used in <VirtualHost>"
        )));
    }
    Ok(())
}

fn check_args<'r>(directive: &Directive, rest: &'r str) -> Result<Args<'r>, ContextError> {
    let words = split_words(rest);
    let help = directive.help;
    let message = match directive.args {
        ArgSpec::Take1 if words.len() != 1 => Some(format!("takes one argument, {help}")),
        ArgSpec::Take12 if words.is_empty() || words.len() > 2 => {
            Some(format!("takes one or two arguments, {help}"))
        }
        ArgSpec::Flag if words.len() != 1 || super::parse_flag(&words[0]).is_none() => {
            Some("must be On or Off".to_string())
        }
        ArgSpec::OneOrMore if words.is_empty() => {
            Some(format!("requires at least one argument, {help}"))
        }
        _ => None,
    };
    match message {
        Some(message) => Err(ContextError::Args {
            directive: directive.name.to_string(),
            message,
        }),
        None => Ok(Args { words, raw: rest }),
    }
}
