//! Error types
//!
//! Startup errors abort the server, request errors fail one request only.

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while parsing the directive configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Syntax error on line {line} of {file}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Syntax error on line {line} of {file}: {directive} not allowed here")]
    NotAllowedHere {
        file: String,
        line: usize,
        directive: String,
    },

    #[error("Syntax error in {file}: Missing {closer} directive at end-of-file")]
    MissingEndSection { file: String, closer: String },

    #[error("Syntax error on line {line} of {file}: {message}")]
    UnexpectedEndSection {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Syntax error on line {line} of {file}: {directive} {message}")]
    Directive {
        file: String,
        line: usize,
        directive: String,
        message: String,
    },

    #[error("Syntax error on line {line} of {file}: invalid regular expression '{pattern}': {source}")]
    Regex {
        file: String,
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while applying an override file during the directory walk
#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct RequestConfigError {
    pub path: PathBuf,
    #[source]
    pub source: ConfigError,
}

/// Resource-level outcome of the content handler
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("file does not exist")]
    NotFound,
    #[error("file permissions deny server access")]
    Forbidden,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("not modified")]
    NotModified,
}

impl ResourceError {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::NotModified => StatusCode::NOT_MODIFIED,
        }
    }
}

/// I/O failure while producing the response body
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("read of {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mmap of {} failed: {source}", path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_closer() {
        let err = ConfigError::MissingEndSection {
            file: "httpd.conf".to_string(),
            closer: "</Directory>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Syntax error in httpd.conf: Missing </Directory> directive at end-of-file"
        );
    }

    #[test]
    fn test_resource_error_status() {
        assert_eq!(ResourceError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ResourceError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ResourceError::PreconditionFailed.status(),
            StatusCode::PRECONDITION_FAILED
        );
    }
}
