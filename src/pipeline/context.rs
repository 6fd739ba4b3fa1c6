//! Per-request state threaded through every hook

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::header::{HeaderMap, HOST};
use hyper::{Method, StatusCode, Version};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::http::method::MethodNumber;
use crate::scope::{EffectiveConfig, ServerIdentity};

pub type RequestBody = BoxBody<Bytes, hyper::Error>;

/// Content type given to directories
pub const DIR_MAGIC_TYPE: &str = "httpd/unix-directory";

pub struct RequestContext {
    pub server: Arc<ServerIdentity>,
    pub method: Method,
    pub method_number: MethodNumber,
    pub header_only: bool,
    /// Request line as the client sent it; survives internal redirects
    pub request_line: String,
    /// Request path as received
    pub unparsed_uri: String,
    /// Decoded, normalized path once the URI has been parsed
    pub uri: String,
    pub args: Option<String>,
    pub version: Version,
    pub headers_in: HeaderMap,
    pub remote_addr: SocketAddr,

    pub filename: Option<PathBuf>,
    pub path_info: String,
    pub finfo: Option<std::fs::Metadata>,
    pub content_type: Option<String>,
    pub config: Arc<EffectiveConfig>,

    pub status: StatusCode,
    pub headers_out: HeaderMap,
    pub body: Bytes,
    pub request_body: Option<RequestBody>,

    /// Set by a hook to restart processing at another URI
    pub internal_redirect: Option<String>,
    /// Original error status while an `ErrorDocument` is being served
    pub redirect_status: Option<StatusCode>,
    pub redirect_count: usize,
    pub started: Instant,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: Arc<ServerIdentity>,
        method: Method,
        path: &str,
        args: Option<String>,
        version: Version,
        headers_in: HeaderMap,
        remote_addr: SocketAddr,
        request_body: Option<RequestBody>,
    ) -> Self {
        let (method_number, header_only) = MethodNumber::classify(&method);
        let config = Arc::new(EffectiveConfig::new(server.defaults.clone()));
        let request_line = match &args {
            Some(args) => format!("{method} {path}?{args} {version:?}"),
            None => format!("{method} {path} {version:?}"),
        };
        Self {
            server,
            request_line,
            method,
            method_number,
            header_only,
            unparsed_uri: path.to_string(),
            uri: path.to_string(),
            args,
            version,
            headers_in,
            remote_addr,
            filename: None,
            path_info: String::new(),
            finfo: None,
            content_type: None,
            config,
            status: StatusCode::OK,
            headers_out: HeaderMap::new(),
            body: Bytes::new(),
            request_body,
            internal_redirect: None,
            redirect_status: None,
            redirect_count: 0,
            started: Instant::now(),
        }
    }

    /// Fresh context for an internal redirect to `target` (path with optional query)
    ///
    /// Request headers and connection data carry over; everything computed
    /// for the previous URI does not.
    #[must_use]
    pub fn redirected(self, target: &str, force_get: bool) -> Self {
        let (path, args) = match target.split_once('?') {
            Some((path, args)) => (path, Some(args.to_string())),
            None => (target, None),
        };
        let method = if force_get && self.method != Method::HEAD {
            Method::GET
        } else {
            self.method
        };
        let mut next = Self::new(
            self.server,
            method,
            path,
            args,
            self.version,
            self.headers_in,
            self.remote_addr,
            self.request_body,
        );
        next.request_line = self.request_line;
        next.redirect_status = self.redirect_status;
        next.redirect_count = self.redirect_count + 1;
        next.started = self.started;
        next
    }

    pub fn header_in(&self, name: &str) -> Option<&str> {
        self.headers_in.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_dir(&self) -> bool {
        self.finfo.as_ref().is_some_and(std::fs::Metadata::is_dir)
    }

    /// Read and drop any request body still on the connection
    pub async fn discard_body(&mut self) {
        if let Some(mut body) = self.request_body.take() {
            while let Some(frame) = body.frame().await {
                if frame.is_err() {
                    break;
                }
            }
        }
    }

    /// Host and port for self-referential URLs
    ///
    /// `UseCanonicalName on` uses `ServerName`/`Port`, otherwise the
    /// client's `Host` header when it sent one.
    pub fn server_authority(&self) -> String {
        if !self.config.use_canonical_name() {
            if let Some(host) = self.header_in(HOST.as_str()) {
                return host.to_string();
            }
        }
        let name = self.server.host_name();
        match self.server.port {
            80 => name.to_string(),
            port => format!("{name}:{port}"),
        }
    }

    /// Absolute URL for a path on this server
    pub fn construct_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.server_authority())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scope::{DirConfig, ServerBuilder, StartupConfig};

    pub(crate) fn server(port: Option<u16>) -> Arc<ServerIdentity> {
        let mut main = ServerBuilder::main(PathBuf::from("/srv/www"));
        main.server_name = Some("www.example.com".to_string());
        main.port = port;
        StartupConfig::new(main, Vec::new()).main
    }

    pub(crate) fn context(method: Method, path: &str) -> RequestContext {
        RequestContext::new(
            server(None),
            method,
            path,
            None,
            Version::HTTP_11,
            HeaderMap::new(),
            "127.0.0.1:40000".parse().unwrap(),
            None,
        )
    }

    #[test]
    fn test_head_is_header_only_get() {
        let ctx = context(Method::HEAD, "/");
        assert_eq!(ctx.method_number, MethodNumber::Get);
        assert!(ctx.header_only);
    }

    #[test]
    fn test_redirect_keeps_request_data() {
        let mut ctx = context(Method::POST, "/form");
        ctx.headers_in.insert(HOST, "example.org".parse().unwrap());
        ctx.status = StatusCode::NOT_FOUND;
        ctx.redirect_status = Some(StatusCode::NOT_FOUND);
        let next = ctx.redirected("/errors/404.html?from=form", true);
        assert_eq!(next.method, Method::GET);
        assert_eq!(next.uri, "/errors/404.html");
        assert_eq!(next.args.as_deref(), Some("from=form"));
        assert_eq!(next.status, StatusCode::OK);
        assert_eq!(next.redirect_status, Some(StatusCode::NOT_FOUND));
        assert_eq!(next.redirect_count, 1);
        assert_eq!(next.header_in("host"), Some("example.org"));
        assert_eq!(next.request_line, "POST /form HTTP/1.1");
        assert_eq!(next.unparsed_uri, "/errors/404.html");
    }

    #[test]
    fn test_construct_url() {
        let mut ctx = context(Method::GET, "/dir");
        ctx.headers_in.insert(HOST, "alias.example.com:8080".parse().unwrap());
        assert_eq!(ctx.construct_url("/dir/"), "http://www.example.com/dir/");

        let mut dir = DirConfig::default();
        dir.use_canonical_name = Some(false);
        ctx.config = Arc::new(EffectiveConfig::new(dir));
        assert_eq!(ctx.construct_url("/dir/"), "http://alias.example.com:8080/dir/");

        let mut ctx = context(Method::GET, "/dir");
        ctx.server = server(Some(8080));
        assert_eq!(ctx.construct_url("/dir/"), "http://www.example.com:8080/dir/");
    }
}
