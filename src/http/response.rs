//! HTTP response building module
//!
//! Turns the final request state into a hyper response, and renders the
//! standard error pages.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};

use crate::scope::ServerSignature;

pub const SERVER_SOFTWARE: &str = concat!("scopehttpd/", env!("CARGO_PKG_VERSION"));

/// Build the response from status, headers and body
pub fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    if let Some(map) = builder.headers_mut() {
        map.extend(headers);
    }
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Plain response used when a connection-level failure leaves no request state
pub fn build_500_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(500)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("500 Internal Server Error")))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(Full::new(Bytes::from("500 Internal Server Error")))
        })
}

/// Address line appended to generated pages
pub fn server_signature(
    mode: ServerSignature,
    host: &str,
    port: u16,
    admin: Option<&str>,
) -> String {
    match mode {
        ServerSignature::Off => String::new(),
        ServerSignature::On => {
            format!("<HR>\n<ADDRESS>{SERVER_SOFTWARE} Server at {host} Port {port}</ADDRESS>\n")
        }
        ServerSignature::Email => format!(
            "<HR>\n<ADDRESS>{SERVER_SOFTWARE} Server at <A HREF=\"mailto:{}\">{host}</A> Port {port}</ADDRESS>\n",
            admin.unwrap_or("[no address given]")
        ),
    }
}

/// HTML page for an error or redirect status
pub fn error_page(
    status: StatusCode,
    uri: &str,
    method: &str,
    location: &str,
    signature: &str,
) -> String {
    let uri = escape_html(uri);
    let detail = match status.as_u16() {
        301 | 302 | 303 | 307 => format!(
            "The document has moved <A HREF=\"{}\">here</A>.<P>",
            escape_html(location)
        ),
        400 => "Your browser sent a request that this server could not understand.<P>".to_string(),
        403 => format!("You don't have permission to access {uri}\non this server.<P>"),
        404 => format!("The requested URL {uri} was not found on this server.<P>"),
        405 => format!("The requested method {method} is not allowed for the URL {uri}.<P>"),
        412 => format!("The precondition on the request for the URL {uri} evaluated to false.<P>"),
        501 => format!("{method} to {uri} not supported.<P>"),
        _ => "The server encountered an internal error or\nmisconfiguration and was unable to complete\nyour request.<P>".to_string(),
    };
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    format!(
        "<!DOCTYPE HTML PUBLIC \"-//IETF//DTD HTML 2.0//EN\">\n<HTML><HEAD>\n<TITLE>{code} {reason}</TITLE>\n</HEAD><BODY>\n<H1>{reason}</H1>\n{detail}\n{signature}</BODY></HTML>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_LENGTH};

    #[test]
    fn test_build_response_keeps_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("5"));
        let resp = build_response(StatusCode::PARTIAL_CONTENT, headers, Bytes::from("hello"));
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "5");
    }

    #[test]
    fn test_error_page_escapes_uri() {
        let page = error_page(StatusCode::NOT_FOUND, "/<script>", "GET", "", "");
        assert!(page.contains("<TITLE>404 Not Found</TITLE>"));
        assert!(page.contains("/&lt;script&gt;"));
    }

    #[test]
    fn test_redirect_page_links_location() {
        let page = error_page(
            StatusCode::MOVED_PERMANENTLY,
            "/docs",
            "GET",
            "http://example.com/docs/",
            "",
        );
        assert!(page.contains("<A HREF=\"http://example.com/docs/\">here</A>"));
    }

    #[test]
    fn test_signature_modes() {
        assert!(server_signature(ServerSignature::Off, "h", 80, None).is_empty());
        let on = server_signature(ServerSignature::On, "www.example.com", 8080, None);
        assert!(on.contains("Server at www.example.com Port 8080"));
        let email = server_signature(ServerSignature::Email, "h", 80, Some("root@h"));
        assert!(email.contains("mailto:root@h"));
    }
}
