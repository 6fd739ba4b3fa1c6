//! HTTP Range request parsing module
//!
//! `bytes` ranges with one or more specs. Specs that cannot be satisfied are
//! dropped; a syntactically invalid header is treated as absent.

use bytes::{BufMut, Bytes, BytesMut};

/// Inclusive byte range already clamped to the entity size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value against the full entity size
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }

    /// Slice of `data` covered by this range
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(data.len());
        let end = usize::try_from(self.end + 1).unwrap_or(usize::MAX).min(data.len());
        &data[start..end]
    }

    /// Shared sub-slice of `data`, clamped like `slice`
    pub fn slice_bytes(&self, data: &Bytes) -> Bytes {
        let len = self.slice(data).len();
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(data.len());
        data.slice(start..start + len)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// At least one satisfiable range, in header order
    Ranges(Vec<ByteRange>),
    /// No header, malformed, or nothing satisfiable: send the full entity
    None,
}

/// Parse a `Range` header against an entity of `file_size` bytes
///
/// # Examples
/// ```
/// use scopehttpd::http::range::{parse_range_header, ByteRange, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=500-999"), 1000);
/// assert_eq!(
///     result,
///     RangeParseResult::Ranges(vec![ByteRange { start: 500, end: 999 }])
/// );
///
/// // Starts past the end: ignored
/// assert_eq!(parse_range_header(Some("bytes=2000-3000"), 1000), RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    let Some(header) = range_header else {
        return RangeParseResult::None;
    };
    let Some(specs) = header.trim().strip_prefix("bytes=") else {
        return RangeParseResult::None;
    };

    let mut ranges = Vec::new();
    for spec in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_spec(spec, file_size) {
            Spec::Satisfiable(range) => ranges.push(range),
            Spec::Unsatisfiable => {}
            Spec::Invalid => return RangeParseResult::None,
        }
    }

    if ranges.is_empty() {
        RangeParseResult::None
    } else {
        RangeParseResult::Ranges(ranges)
    }
}

enum Spec {
    Satisfiable(ByteRange),
    Unsatisfiable,
    Invalid,
}

fn parse_spec(spec: &str, file_size: u64) -> Spec {
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Spec::Invalid;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // Suffix range: "-500" means the last 500 bytes
    if start_str.is_empty() {
        let Ok(suffix) = end_str.parse::<u64>() else {
            return Spec::Invalid;
        };
        if suffix == 0 || file_size == 0 {
            return Spec::Unsatisfiable;
        }
        return Spec::Satisfiable(ByteRange {
            start: file_size.saturating_sub(suffix),
            end: file_size - 1,
        });
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return Spec::Invalid;
    };
    let end = if end_str.is_empty() {
        None
    } else {
        match end_str.parse::<u64>() {
            Ok(end) => Some(end),
            Err(_) => return Spec::Invalid,
        }
    };
    if end.is_some_and(|end| end < start) {
        return Spec::Invalid;
    }
    if start >= file_size {
        return Spec::Unsatisfiable;
    }
    Spec::Satisfiable(ByteRange {
        start,
        end: end.map_or(file_size - 1, |end| end.min(file_size - 1)),
    })
}

/// Boundary for a `multipart/byteranges` body
pub fn make_boundary(mtime: i64, size: u64) -> String {
    format!("{mtime:x}{size:x}{:x}", std::process::id())
}

fn part_header(range: &ByteRange, total: u64, content_type: &str, boundary: &str) -> String {
    format!(
        "\r\n--{boundary}\r\nContent-Type: {content_type}\r\nContent-Range: {}\r\n\r\n",
        range.content_range(total)
    )
}

fn closing(boundary: &str) -> String {
    format!("\r\n--{boundary}--\r\n")
}

/// Build a `multipart/byteranges` body from the whole entity
pub fn multipart_body(
    data: &[u8],
    ranges: &[ByteRange],
    content_type: &str,
    boundary: &str,
) -> Bytes {
    let total = data.len() as u64;
    let mut body = BytesMut::new();
    for range in ranges {
        body.put_slice(part_header(range, total, content_type, boundary).as_bytes());
        body.put_slice(range.slice(data));
    }
    body.put_slice(closing(boundary).as_bytes());
    body.freeze()
}

/// Exact length of `multipart_body` without building it
pub fn multipart_len(ranges: &[ByteRange], total: u64, content_type: &str, boundary: &str) -> u64 {
    let parts: u64 = ranges
        .iter()
        .map(|r| part_header(r, total, content_type, boundary).len() as u64 + r.len())
        .sum();
    parts + closing(boundary).len() as u64
}
