//! Directive configuration
//!
//! A directive file is parsed once at startup into a `StartupConfig`; the same
//! grammar is parsed per request for override files. Every directive is a
//! `Directive` entry saying where it may appear and how its arguments apply.

pub mod commands;
pub mod parser;

use std::collections::HashMap;
use std::path::Path;

use crate::http::method::MethodMask;
use crate::scope::{DirConfig, Override, ServerBuilder};

pub use parser::{ConfigParser, LineSource};

/// Argument shape checked before a handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSpec {
    Take1,
    Take12,
    Flag,
    OneOrMore,
    /// Anything, the handler reads `Args::raw`
    Raw,
}

/// Context restrictions beyond the allowed-context bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Restrict(u8);

impl Restrict {
    pub const NONE: Self = Self(0);
    pub const NOT_IN_VIRTUALHOST: Self = Self(1);
    pub const NOT_IN_LIMIT: Self = Self(1 << 1);
    pub const NOT_IN_DIR_LOC_FILE: Self = Self(1 << 2);
    pub const NOT_IN_LOCATION: Self = Self(1 << 3);
    pub const NOT_IN_FILES: Self = Self(1 << 4);
    pub const VIRTUAL_ONLY: Self = Self(1 << 5);
    pub const GLOBAL_ONLY: Self = Self(1 | (1 << 1) | (1 << 2));

    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// Containers handled by the parser itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Directory,
    DirectoryMatch,
    Location,
    LocationMatch,
    Files,
    FilesMatch,
    Limit,
    IfModule,
    VirtualHost,
}

pub type DirHandler = fn(&CmdParms<'_>, &mut DirConfig, &Args<'_>) -> Result<(), String>;
pub type ServerHandler = fn(&CmdParms<'_>, &mut ServerBuilder, &Args<'_>) -> Result<(), String>;

#[derive(Clone, Copy)]
pub enum Handler {
    /// Applies to the per-directory config of the current scope
    Dir(DirHandler),
    /// Applies to the server being configured
    Server(ServerHandler),
    Container(Container),
    Include,
}

#[derive(Clone, Copy)]
pub struct Directive {
    pub name: &'static str,
    pub handler: Handler,
    pub allowed: Override,
    pub restrict: Restrict,
    pub args: ArgSpec,
    pub help: &'static str,
}

impl Directive {
    pub const fn dir(
        name: &'static str,
        handler: DirHandler,
        allowed: Override,
        args: ArgSpec,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            handler: Handler::Dir(handler),
            allowed,
            restrict: Restrict::NONE,
            args,
            help,
        }
    }

    pub const fn server(
        name: &'static str,
        handler: ServerHandler,
        args: ArgSpec,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            handler: Handler::Server(handler),
            allowed: Override::RSRC_CONF,
            restrict: Restrict::NONE,
            args,
            help,
        }
    }

    #[must_use]
    pub const fn restricted(mut self, restrict: Restrict) -> Self {
        self.restrict = restrict;
        self
    }
}

impl std::fmt::Debug for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directive")
            .field("name", &self.name)
            .field("allowed", &self.allowed)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// What a handler knows about where it was invoked
#[derive(Debug, Clone, Copy)]
pub struct CmdParms<'a> {
    pub directive: &'static str,
    /// Methods of the enclosing `<Limit>`
    pub limit: Option<MethodMask>,
    /// Pattern of the enclosing section, or the override file's directory
    pub path: Option<&'a str>,
    pub server_root: &'a Path,
    pub in_virtual: bool,
}

/// Arguments of one directive line
#[derive(Debug, Clone)]
pub struct Args<'a> {
    pub words: Vec<String>,
    /// Unsplit text after the directive name
    pub raw: &'a str,
}

impl Args<'_> {
    pub fn first(&self) -> &str {
        self.words.first().map_or("", String::as_str)
    }
}

/// Lookup table of every directive known to the loaded modules
#[derive(Debug, Default)]
pub struct DirectiveTable {
    directives: HashMap<String, Directive>,
}

impl DirectiveTable {
    pub fn new<I: IntoIterator<Item = Directive>>(directives: I) -> Self {
        let mut table = Self::default();
        for directive in directives {
            table.insert(directive);
        }
        table
    }

    /// Later registrations of the same name replace earlier ones
    pub fn insert(&mut self, directive: Directive) {
        self.directives
            .insert(directive.name.to_ascii_lowercase(), directive);
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// `On`/`Off` argument of a flag directive
pub fn parse_flag(word: &str) -> Option<bool> {
    if word.eq_ignore_ascii_case("on") {
        Some(true)
    } else if word.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}
