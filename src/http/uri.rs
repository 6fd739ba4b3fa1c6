//! Request path escaping and unescaping

use hyper::StatusCode;

/// `%XX` decoding of a request path
///
/// A malformed escape is a bad request. An encoded `/` or NUL could smuggle
/// a path separator past the section matching, so it is refused with 404.
pub fn percent_decode(path: &str) -> Result<String, StatusCode> {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or(StatusCode::BAD_REQUEST)?;
            if hex == b'/' || hex == 0 {
                return Err(StatusCode::NOT_FOUND);
            }
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| StatusCode::BAD_REQUEST)
}

/// Escape a decoded path for use in a URL or an internal redirect
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || b"$-_.+!*'(),:@&=~/".contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02x}"));
        }
    }
    out
}

/// Whether `value` starts with a URL scheme (`name:` of letters, digits, `+-.`)
pub fn is_url(value: &str) -> bool {
    value.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"+-.".contains(&b))
    })
}
