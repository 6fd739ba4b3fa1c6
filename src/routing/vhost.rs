//! Virtual host matching module
//!
//! Selects a `ServerIdentity` by the request's Host header.
//! Supports exact names and wildcard prefixes (*.) in `ServerName`/`ServerAlias`.

use std::sync::Arc;

use crate::scope::ServerIdentity;

/// Resolve the matching virtual host for a given Host header
///
/// Matching priority:
/// 1. Exact name match ("api.example.com")
/// 2. Wildcard suffix match ("*.example.com")
///
/// Returns None if no virtual host matches; the caller falls back to the main server.
pub fn resolve_virtual_host<'a>(
    host: &str,
    virtual_hosts: &'a [Arc<ServerIdentity>],
) -> Option<&'a Arc<ServerIdentity>> {
    let host = strip_port(host);

    // First pass: look for exact match
    if let Some(vhost) = virtual_hosts
        .iter()
        .find(|v| v.names().any(|name| name.eq_ignore_ascii_case(host)))
    {
        return Some(vhost);
    }

    // Second pass: look for wildcard match
    virtual_hosts.iter().find(|v| {
        v.names()
            .any(|name| name.starts_with("*.") && match_wildcard_domain(name, host))
    })
}

/// Strip port from host if present ("example.com:8080" -> "example.com")
fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

/// Match wildcard domain pattern (*.example.com)
fn match_wildcard_domain(pattern: &str, host: &str) -> bool {
    let suffix = &pattern[1..]; // ".example.com"
    let host = host.to_ascii_lowercase();

    if host.ends_with(&suffix.to_ascii_lowercase()) {
        return true;
    }

    // Also match the bare domain
    host.eq_ignore_ascii_case(&pattern[2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ServerBuilder;
    use std::path::PathBuf;

    fn vhost(name: &str, aliases: &[&str]) -> Arc<ServerIdentity> {
        let main = ServerBuilder::main(PathBuf::from("/srv")).finish_main();
        let mut builder = ServerBuilder::virtual_host(vec!["*".to_string()]);
        builder.server_name = Some(name.to_string());
        builder.aliases = aliases.iter().map(ToString::to_string).collect();
        Arc::new(builder.finish_virtual(&main))
    }

    #[test]
    fn test_resolve_ignores_port_and_case() {
        let vhosts = vec![vhost("docs.example.com", &["manual.example.com"])];
        assert!(resolve_virtual_host("DOCS.example.com:8080", &vhosts).is_some());
        assert!(resolve_virtual_host("manual.example.com", &vhosts).is_some());
        assert!(resolve_virtual_host("example.com", &vhosts).is_none());
    }

    #[test]
    fn test_wildcard_covers_bare_domain() {
        let vhosts = vec![vhost("www.example.com", &["*.example.com"])];
        assert!(resolve_virtual_host("example.com", &vhosts).is_some());
        assert!(resolve_virtual_host("api.example.com:81", &vhosts).is_some());
        assert!(resolve_virtual_host("api.other.com", &vhosts).is_none());
    }

    #[test]
    fn test_resolve_virtual_host_priority() {
        let vhosts = vec![
            vhost("wild.example.com", &["*.example.com"]),
            vhost("api.example.com", &[]),
        ];

        let result = resolve_virtual_host("api.example.com", &vhosts);
        assert_eq!(result.unwrap().host_name(), "api.example.com");

        let result = resolve_virtual_host("www.example.com", &vhosts);
        assert_eq!(result.unwrap().host_name(), "wild.example.com");

        assert!(resolve_virtual_host("other.com", &vhosts).is_none());
    }
}
