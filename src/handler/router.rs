//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: picks the server identity for
//! the Host header, runs the request pipeline and turns the final request
//! state into a response.

use crate::config::AppState;
use crate::http::response::{build_response, SERVER_SOFTWARE};
use crate::pipeline::RequestContext;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE, DATE, HOST, SERVER};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let host = parts.headers.get(HOST).and_then(|v| v.to_str().ok());
    let server = state.startup.select(host);

    // Absolute-form targets are proxy requests and get refused by the pipeline
    let target = if parts.uri.scheme().is_some() {
        parts.uri.to_string()
    } else {
        parts.uri.path().to_string()
    };

    let ctx = RequestContext::new(
        server,
        parts.method,
        &target,
        parts.uri.query().map(str::to_string),
        parts.version,
        parts.headers,
        remote_addr,
        Some(body.boxed()),
    );
    let ctx = state.pipeline.run(ctx).await;
    Ok(into_response(ctx))
}

/// Build the response from a finished request
pub fn into_response(mut ctx: RequestContext) -> Response<Full<Bytes>> {
    let mut headers = std::mem::take(&mut ctx.headers_out);
    headers.insert(SERVER, HeaderValue::from_static(SERVER_SOFTWARE));
    if let Ok(date) = HeaderValue::from_str(&crate::http::date::format_http_date(chrono::Utc::now())) {
        headers.insert(DATE, date);
    }
    if !headers.contains_key(CONTENT_TYPE) && !ctx.body.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
    }
    let body = if ctx.header_only {
        Bytes::new()
    } else {
        std::mem::take(&mut ctx.body)
    };
    build_response(ctx.status, headers, body)
}
