//! Scope sections and their path patterns
//!
//! A section binds a `DirConfig` to a pattern on one of three axes:
//! filesystem directories, URL paths or final filename segments.

use regex::{Regex, RegexBuilder};

use super::dir_config::DirConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Directory,
    DirectoryMatch,
    Location,
    LocationMatch,
    Files,
    FilesMatch,
}

impl SectionKind {
    /// Directory-family and Files-family regexes ignore case, Location ones do not
    pub const fn case_insensitive(self) -> bool {
        !matches!(self, Self::Location | Self::LocationMatch)
    }

    pub const fn is_files(self) -> bool {
        matches!(self, Self::Files | Self::FilesMatch)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Directory => "Directory",
            Self::DirectoryMatch => "DirectoryMatch",
            Self::Location => "Location",
            Self::LocationMatch => "LocationMatch",
            Self::Files => "Files",
            Self::FilesMatch => "FilesMatch",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal prefix (exact name for Files)
    Literal(String),
    /// fnmatch-style wildcard, compiled to an anchored regex
    Glob { source: String, regex: Regex },
    Regex(Regex),
}

impl Pattern {
    /// Build a literal or glob pattern from a section argument
    pub fn literal(kind: SectionKind, raw: &str) -> Result<Self, regex::Error> {
        let text = if kind.is_files() {
            raw.to_string()
        } else {
            normalize_section_path(raw)
        };
        if is_glob(&text) {
            let regex = RegexBuilder::new(&glob_to_regex(&text))
                .case_insensitive(false)
                .build()?;
            Ok(Self::Glob {
                source: text,
                regex,
            })
        } else {
            Ok(Self::Literal(text))
        }
    }

    pub fn regex(kind: SectionKind, raw: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(raw)
            .case_insensitive(kind.case_insensitive())
            .build()
            .map(Self::Regex)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Glob { source: s, .. } => s,
            Self::Regex(re) => re.as_str(),
        }
    }

    pub const fn is_regex(&self) -> bool {
        matches!(self, Self::Regex(_))
    }
}

/// One configuration scope, immutable after parsing
#[derive(Debug, Clone)]
pub struct ScopeSection {
    pub kind: SectionKind,
    pub pattern: Pattern,
    /// Component count of a literal pattern
    pub specificity: usize,
    /// Regex based, or a literal that does not start at the root
    pub special: bool,
    pub config: DirConfig,
}

impl ScopeSection {
    pub fn new(kind: SectionKind, pattern: Pattern, config: DirConfig) -> Self {
        let special = pattern.is_regex() || (!kind.is_files() && !pattern.as_str().starts_with('/'));
        let specificity = if pattern.is_regex() {
            usize::MAX
        } else {
            count_components(pattern.as_str())
        };
        Self {
            kind,
            pattern,
            specificity,
            special,
            config,
        }
    }

    /// Match a directory (with trailing slash) or URL path
    pub fn matches_path(&self, path: &str) -> bool {
        match &self.pattern {
            Pattern::Regex(re) => re.is_match(path),
            Pattern::Literal(prefix) if self.special => path.starts_with(prefix.as_str()),
            Pattern::Literal(prefix) => {
                if prefix == "/" {
                    return path.starts_with('/');
                }
                let trimmed = prefix.trim_end_matches('/');
                path.starts_with(trimmed)
                    && matches!(path.as_bytes().get(trimmed.len()), None | Some(b'/'))
            }
            Pattern::Glob { regex, .. } => leading_components(path, self.specificity)
                .is_some_and(|head| regex.is_match(head)),
        }
    }

    /// Match the final segment of a filename
    pub fn matches_name(&self, name: &str) -> bool {
        match &self.pattern {
            Pattern::Regex(re) => re.is_match(name),
            Pattern::Literal(exact) => exact == name,
            Pattern::Glob { regex, .. } => regex.is_match(name),
        }
    }
}

pub fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Number of `/` separators, the depth used for ordering
pub fn count_components(path: &str) -> usize {
    path.bytes().filter(|b| *b == b'/').count()
}

/// Prefix of `path` holding its first `n` slash-terminated components
pub(crate) fn leading_components(path: &str, n: usize) -> Option<&str> {
    path.match_indices('/')
        .nth(n.checked_sub(1)?)
        .map(|(idx, _)| &path[..=idx])
}

/// Translate an fnmatch pattern into an anchored regex; wildcards stop at `/`
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '^' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// Resolve `.` and `..` lexically; `None` if `..` climbs above the root
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    let mut out = String::with_capacity(path.len());
    if path.starts_with('/') {
        out.push('/');
    }
    out.push_str(&parts.join("/"));
    if path.ends_with('/') && !out.ends_with('/') {
        out.push('/');
    }
    Some(out)
}

/// Canonical form of a `<Directory>`/`<Location>` argument: cleaned, slash-terminated
fn normalize_section_path(raw: &str) -> String {
    if !raw.starts_with('/') {
        return raw.to_string();
    }
    let mut path = normalize_path(raw).unwrap_or_else(|| "/".to_string());
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}
