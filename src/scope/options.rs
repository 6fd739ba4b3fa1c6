//! Option and override bitsets
//!
//! `Options` holds the per-directory feature switches (`Options` directive),
//! `Override` holds both the categories an override file may touch
//! (`AllowOverride`) and the configuration contexts a directive is legal in.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Per-directory feature switches
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Options(u16);

impl Options {
    pub const NONE: Self = Self(0);
    pub const INDEXES: Self = Self(1);
    pub const INCLUDES: Self = Self(1 << 1);
    pub const SYM_LINKS: Self = Self(1 << 2);
    pub const EXEC_CGI: Self = Self(1 << 3);
    pub const INCLUDES_NOEXEC: Self = Self(1 << 5);
    pub const SYM_OWNER: Self = Self(1 << 6);
    pub const MULTI_VIEWS: Self = Self(1 << 7);
    pub const ALL: Self = Self(1 | (1 << 1) | (1 << 2) | (1 << 3));

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set difference (`self \ other`)
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Parse one `Options` keyword (case-insensitive, without the +/- prefix)
    pub fn from_keyword(word: &str) -> Option<Self> {
        let opt = match word.to_ascii_lowercase().as_str() {
            "indexes" => Self::INDEXES,
            "includes" => Self::INCLUDES,
            "includesnoexec" => Self(Self::INCLUDES.0 | Self::INCLUDES_NOEXEC.0),
            "followsymlinks" => Self::SYM_LINKS,
            "symlinksifownermatch" => Self::SYM_OWNER,
            "execcgi" => Self::EXEC_CGI,
            "multiviews" => Self::MULTI_VIEWS,
            "runscripts" => Self(Self::MULTI_VIEWS.0 | Self::EXEC_CGI.0),
            "none" => Self::NONE,
            "all" => Self::ALL,
            _ => return None,
        };
        Some(opt)
    }
}

impl BitOr for Options {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Options {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Options, &str); 7] = [
            (Options::INDEXES, "Indexes"),
            (Options::INCLUDES, "Includes"),
            (Options::SYM_LINKS, "FollowSymLinks"),
            (Options::EXEC_CGI, "ExecCGI"),
            (Options::INCLUDES_NOEXEC, "IncludesNOEXEC"),
            (Options::SYM_OWNER, "SymLinksIfOwnerMatch"),
            (Options::MULTI_VIEWS, "MultiViews"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(opt, _)| self.contains(*opt))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "Options(None)")
        } else {
            write!(f, "Options({})", names.join("|"))
        }
    }
}

/// Override categories and configuration contexts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Override(u16);

impl Override {
    pub const NONE: Self = Self(0);
    pub const LIMIT: Self = Self(1);
    pub const OPTIONS: Self = Self(1 << 1);
    pub const FILEINFO: Self = Self(1 << 2);
    pub const AUTHCFG: Self = Self(1 << 3);
    pub const INDEXES: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);
    /// Main server config or `<VirtualHost>` top level
    pub const RSRC_CONF: Self = Self(1 << 6);
    /// Inside `<Directory>`, `<Location>` or `<Files>` of the server config
    pub const ACCESS_CONF: Self = Self(1 << 7);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_none(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    /// Parse one `AllowOverride` keyword
    pub fn from_keyword(word: &str) -> Option<Self> {
        let value = match word.to_ascii_lowercase().as_str() {
            "limit" => Self::LIMIT,
            "options" => Self::OPTIONS,
            "fileinfo" => Self::FILEINFO,
            "authconfig" => Self::AUTHCFG,
            "indexes" => Self::INDEXES,
            "none" => Self::NONE,
            "all" => Self::ALL,
            _ => return None,
        };
        Some(value)
    }
}

impl BitOr for Override {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Override {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Override {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Override {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Override({:#010b})", self.0)
    }
}
