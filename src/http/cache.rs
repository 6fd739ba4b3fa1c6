//! HTTP cache validators module
//!
//! Provides `ETag`/`Last-Modified` generation from file metadata and the
//! conditional request checks that run before any content is read.

use chrono::{DateTime, Utc};
use hyper::header::{
    HeaderMap, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE,
};

use super::date::{format_http_date, parse_http_date};
use crate::error::ResourceError;

/// Validators of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    /// Quoted strong `ETag`, e.g. `"3e8-2ecd3b89"`
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl Validators {
    pub fn new(size: u64, mtime: DateTime<Utc>) -> Self {
        Self {
            etag: format!("\"{size:x}-{:x}\"", mtime.timestamp()),
            last_modified: mtime,
        }
    }

    pub fn last_modified_header(&self) -> String {
        format_http_date(self.last_modified)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &hyper::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

/// Any listed tag equals ours; weak tags never match when `strong` is set
fn list_matches(list: &str, etag: &str, strong: bool) -> bool {
    list.split(',').map(str::trim).any(|tag| {
        if tag == "*" {
            return true;
        }
        if strong {
            !tag.starts_with("W/") && tag == etag
        } else {
            strip_weak(tag) == strip_weak(etag)
        }
    })
}

/// Evaluate `If-*` headers in precedence order
///
/// `If-Modified-Since` dates in the future are ignored, and it is not
/// consulted at all once `If-None-Match` is present.
pub fn meets_conditions(
    headers: &HeaderMap,
    validators: &Validators,
    is_get_or_head: bool,
    now: DateTime<Utc>,
) -> Result<(), ResourceError> {
    if let Some(if_match) = header(headers, &IF_MATCH) {
        if !list_matches(if_match, &validators.etag, true) {
            return Err(ResourceError::PreconditionFailed);
        }
    } else if let Some(since) = header(headers, &IF_UNMODIFIED_SINCE).and_then(parse_http_date) {
        if validators.last_modified > since {
            return Err(ResourceError::PreconditionFailed);
        }
    }

    if let Some(if_none_match) = header(headers, &IF_NONE_MATCH) {
        if list_matches(if_none_match, &validators.etag, false) {
            return Err(if is_get_or_head {
                ResourceError::NotModified
            } else {
                ResourceError::PreconditionFailed
            });
        }
    } else if is_get_or_head {
        if let Some(since) = header(headers, &IF_MODIFIED_SINCE).and_then(parse_http_date) {
            if since <= now && validators.last_modified <= since {
                return Err(ResourceError::NotModified);
            }
        }
    }
    Ok(())
}

/// Whether a `Range` header may be honored under `If-Range`
pub fn if_range_allows(headers: &HeaderMap, validators: &Validators) -> bool {
    let Some(value) = header(headers, &IF_RANGE).map(str::trim) else {
        return true;
    };
    if value.starts_with('"') || value.starts_with("W/") {
        return !value.starts_with("W/") && value == validators.etag;
    }
    parse_http_date(value).is_some_and(|date| validators.last_modified <= date)
}
