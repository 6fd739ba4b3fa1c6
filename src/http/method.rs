//! Method numbering
//!
//! Maps request methods onto the small set the server distinguishes, and
//! provides the bitmask used by `<Limit>` sections and `Require` lines.

use hyper::Method;

/// Methods known to the method-limiting layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodNumber {
    Get,
    Put,
    Post,
    Delete,
    Connect,
    Options,
    Invalid,
}

impl MethodNumber {
    /// Classify a request method; `HEAD` maps to `Get` with `header_only` set
    pub fn classify(method: &Method) -> (Self, bool) {
        match *method {
            Method::GET => (Self::Get, false),
            Method::HEAD => (Self::Get, true),
            Method::PUT => (Self::Put, false),
            Method::POST => (Self::Post, false),
            Method::DELETE => (Self::Delete, false),
            Method::CONNECT => (Self::Connect, false),
            Method::OPTIONS => (Self::Options, false),
            _ => (Self::Invalid, false),
        }
    }

    /// Parse a method token as written inside `<Limit>`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "POST" => Some(Self::Post),
            "DELETE" => Some(Self::Delete),
            "CONNECT" => Some(Self::Connect),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Get => 1,
            Self::Put => 1 << 1,
            Self::Post => 1 << 2,
            Self::Delete => 1 << 3,
            Self::Connect => 1 << 4,
            Self::Options => 1 << 5,
            Self::Invalid => 1 << 6,
        }
    }
}

/// Set of methods a `<Limit>` block or `Require` line applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodMask(u8);

impl MethodMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u8::MAX);

    #[must_use]
    pub const fn with(self, method: MethodNumber) -> Self {
        Self(self.0 | method.bit())
    }

    pub const fn covers(self, method: MethodNumber) -> bool {
        self.0 & method.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for MethodMask {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_maps_to_get() {
        assert_eq!(
            MethodNumber::classify(&Method::HEAD),
            (MethodNumber::Get, true)
        );
        assert_eq!(
            MethodNumber::classify(&Method::GET),
            (MethodNumber::Get, false)
        );
    }

    #[test]
    fn test_unknown_method_is_invalid() {
        let patch = Method::PATCH;
        assert_eq!(MethodNumber::classify(&patch).0, MethodNumber::Invalid);
        assert_eq!(MethodNumber::from_token("PATCH"), None);
        assert_eq!(MethodNumber::from_token("get"), None);
    }

    #[test]
    fn test_mask() {
        let mask = MethodMask::NONE
            .with(MethodNumber::Get)
            .with(MethodNumber::Post);
        assert!(mask.covers(MethodNumber::Get));
        assert!(mask.covers(MethodNumber::Post));
        assert!(!mask.covers(MethodNumber::Put));
        assert!(MethodMask::ALL.covers(MethodNumber::Delete));
    }
}
