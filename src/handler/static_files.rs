//! Static file serving module
//!
//! The default content handler. Conditions are checked from metadata before
//! any content is read; the body then comes from a memory map for files at
//! or above the map threshold and from a buffered read otherwise. Both give
//! the same bytes, so digests and ranges do not depend on the strategy.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use hyper::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, LAST_MODIFIED,
};
use hyper::StatusCode;
use md5::{Digest, Md5};
use memmap2::Mmap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::TransferError;
use crate::http::cache::{if_range_allows, meets_conditions, Validators};
use crate::http::date::to_http_time;
use crate::http::method::MethodNumber;
use crate::http::range::{self, parse_range_header, RangeParseResult};
use crate::logger;
use crate::pipeline::{HookResult, RequestContext};

pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

static CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// Serve the translated file for `ctx`
pub async fn serve(ctx: &mut RequestContext, mmap_threshold: u64) -> HookResult {
    ctx.discard_body().await;

    match ctx.method_number {
        MethodNumber::Invalid => {
            logger::log_error(&format!("Invalid method in request {}", ctx.method));
            return HookResult::Error(StatusCode::NOT_IMPLEMENTED);
        }
        MethodNumber::Options => {
            ctx.headers_out
                .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
            return HookResult::Handled(StatusCode::OK);
        }
        MethodNumber::Put => return HookResult::Error(StatusCode::METHOD_NOT_ALLOWED),
        _ => {}
    }

    let (Some(filename), Some(walked)) = (ctx.filename.clone(), ctx.finfo.as_ref()) else {
        logger::log_info(&format!("File does not exist: {}", ctx.uri));
        return HookResult::Error(StatusCode::NOT_FOUND);
    };
    if walked.is_dir() || !ctx.path_info.is_empty() {
        logger::log_info(&format!(
            "File does not exist: {}{}",
            filename.display(),
            ctx.path_info
        ));
        return HookResult::Error(StatusCode::NOT_FOUND);
    }
    if ctx.method_number != MethodNumber::Get {
        ctx.headers_out
            .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        return HookResult::Error(StatusCode::METHOD_NOT_ALLOWED);
    }

    let file = match File::open(&filename).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return HookResult::Error(StatusCode::NOT_FOUND),
        Err(e) => {
            logger::log_error(&format!(
                "file permissions deny server access: {}: {e}",
                filename.display()
            ));
            return HookResult::Error(StatusCode::FORBIDDEN);
        }
    };

    // The walk's stat may be stale by now; describe the file actually opened
    let meta = match file.metadata().await {
        Ok(meta) => meta,
        Err(e) => {
            logger::log_error(&format!("stat of {} failed: {e}", filename.display()));
            return HookResult::Error(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let now = Utc::now();
    let size = meta.len();
    let mtime = meta.modified().map_or(now, to_http_time).min(now);
    let validators = Validators::new(size, mtime);
    set_header(ctx, LAST_MODIFIED, &validators.last_modified_header());
    set_header(ctx, ETAG, &validators.etag);

    if let Err(e) = meets_conditions(&ctx.headers_in, &validators, true, now) {
        return HookResult::Error(e.status());
    }

    let digest = ctx.config.content_md5();
    let data = if ctx.header_only && !digest {
        Bytes::new()
    } else {
        match read_entity(file, &filename, size, mmap_threshold).await {
            Ok(data) if data.len() as u64 == size => data,
            Ok(data) => {
                logger::log_error(&format!(
                    "{} changed while being read: expected {size} bytes, got {}",
                    filename.display(),
                    data.len()
                ));
                return HookResult::Error(StatusCode::INTERNAL_SERVER_ERROR);
            }
            Err(e) => {
                logger::log_error(&e.to_string());
                return HookResult::Error(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    };
    if digest {
        set_header(ctx, CONTENT_MD5.clone(), &STANDARD.encode(Md5::digest(&data)));
    }

    let content_type = ctx
        .content_type
        .clone()
        .unwrap_or_else(|| ctx.config.default_type().to_string());
    ctx.headers_out
        .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let ranges = if if_range_allows(&ctx.headers_in, &validators) {
        parse_range_header(ctx.header_in("range"), size)
    } else {
        RangeParseResult::None
    };

    let (status, body, length) = match ranges {
        RangeParseResult::Ranges(ranges) if ranges.len() == 1 => {
            let part = ranges[0];
            set_header(ctx, CONTENT_RANGE, &part.content_range(size));
            set_header(ctx, CONTENT_TYPE, &content_type);
            let body = if ctx.header_only {
                Bytes::new()
            } else {
                part.slice_bytes(&data)
            };
            (StatusCode::PARTIAL_CONTENT, body, part.len())
        }
        RangeParseResult::Ranges(ranges) => {
            let boundary = range::make_boundary(mtime.timestamp(), size);
            let length = range::multipart_len(&ranges, size, &content_type, &boundary);
            let body = if ctx.header_only {
                Bytes::new()
            } else {
                range::multipart_body(&data, &ranges, &content_type, &boundary)
            };
            set_header(
                ctx,
                CONTENT_TYPE,
                &format!("multipart/byteranges; boundary={boundary}"),
            );
            (StatusCode::PARTIAL_CONTENT, body, length)
        }
        RangeParseResult::None => {
            set_header(ctx, CONTENT_TYPE, &content_type);
            let body = if ctx.header_only { Bytes::new() } else { data };
            (StatusCode::OK, body, size)
        }
    };

    ctx.headers_out.insert(CONTENT_LENGTH, HeaderValue::from(length));
    ctx.body = body;
    HookResult::Handled(status)
}

fn set_header(ctx: &mut RequestContext, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            ctx.headers_out.insert(name, value);
        }
        Err(e) => logger::log_warning(&format!("Dropping {name} header {value:?}: {e}")),
    }
}

/// Whole file contents by the strategy its size calls for
async fn read_entity(
    file: File,
    path: &Path,
    size: u64,
    mmap_threshold: u64,
) -> Result<Bytes, TransferError> {
    if size > 0 && size >= mmap_threshold {
        let file = file.into_std().await;
        map_file(&file, path)
    } else {
        read_file(file, path, size).await
    }
}

/// Read-only mapping owned by the returned `Bytes`
///
/// The mapping is released when the last slice is dropped, which covers a
/// finished response, an error and a dropped connection alike.
#[allow(unsafe_code)]
fn map_file(file: &std::fs::File, path: &Path) -> Result<Bytes, TransferError> {
    // SAFETY: the map is read-only and never handed out mutably; it lives
    // exactly as long as the `Bytes` that owns it.
    let map = unsafe { Mmap::map(file) }.map_err(|source| TransferError::Map {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Bytes::from_owner(map))
}

async fn read_file(mut file: File, path: &Path, size: u64) -> Result<Bytes, TransferError> {
    let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    file.read_to_end(&mut buf)
        .await
        .map_err(|source| TransferError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Bytes::from(buf))
}
