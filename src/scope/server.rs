//! Server identities and the frozen startup configuration

use std::path::PathBuf;
use std::sync::Arc;

use super::dir_config::{self, DirConfig, ModuleConfigs};
use super::registry::SectionRegistry;
use super::section::ScopeSection;
use crate::logger::LogLevel;
use crate::routing::vhost;

pub const DEFAULT_ACCESS_FILE_NAME: &str = ".htaccess";
pub const DEFAULT_PORT: u16 = 80;

/// Main server or one virtual host, immutable once built
#[derive(Debug)]
pub struct ServerIdentity {
    pub server_name: Option<String>,
    pub aliases: Vec<String>,
    pub admin: Option<String>,
    pub port: u16,
    pub addresses: Vec<String>,
    pub is_virtual: bool,
    pub document_root: PathBuf,
    pub access_file_name: String,
    /// Per-directory defaults, base of every walk
    pub defaults: DirConfig,
    pub directories: SectionRegistry,
    pub locations: SectionRegistry,
    /// Per-server module configuration
    pub modules: ModuleConfigs,
}

impl ServerIdentity {
    /// `ServerName`, falling back to the first address or `localhost`
    pub fn host_name(&self) -> &str {
        self.server_name
            .as_deref()
            .or_else(|| self.addresses.first().map(String::as_str))
            .unwrap_or("localhost")
    }

    /// All names the `Host` header may select this server by
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.server_name
            .iter()
            .chain(&self.aliases)
            .map(String::as_str)
    }
}

/// Mutable server state while the directive file is parsed
#[derive(Debug, Default)]
pub struct ServerBuilder {
    pub server_name: Option<String>,
    pub aliases: Vec<String>,
    pub admin: Option<String>,
    pub port: Option<u16>,
    pub addresses: Vec<String>,
    pub is_virtual: bool,
    pub document_root: Option<PathBuf>,
    pub access_file_name: Option<String>,
    pub defaults: DirConfig,
    pub directories: Vec<Arc<ScopeSection>>,
    pub locations: Vec<Arc<ScopeSection>>,
    pub modules: ModuleConfigs,
    /// `LogLevel`, main server only
    pub log_level: Option<LogLevel>,
}

impl ServerBuilder {
    pub fn main(document_root: PathBuf) -> Self {
        Self {
            document_root: Some(document_root),
            defaults: DirConfig::server_defaults(),
            ..Self::default()
        }
    }

    pub fn virtual_host(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            is_virtual: true,
            ..Self::default()
        }
    }

    /// Freeze the main server
    pub fn finish_main(self) -> ServerIdentity {
        ServerIdentity {
            server_name: self.server_name,
            aliases: self.aliases,
            admin: self.admin,
            port: self.port.unwrap_or(DEFAULT_PORT),
            addresses: self.addresses,
            is_virtual: false,
            document_root: self.document_root.unwrap_or_default(),
            access_file_name: self
                .access_file_name
                .unwrap_or_else(|| DEFAULT_ACCESS_FILE_NAME.to_string()),
            defaults: self.defaults,
            directories: SectionRegistry::from_sections(self.directories),
            locations: SectionRegistry::from_sections(self.locations),
            modules: self.modules,
        }
    }

    /// Freeze a virtual host on top of the main server
    pub fn finish_virtual(self, main: &ServerIdentity) -> ServerIdentity {
        let directories = main
            .directories
            .in_registration_order()
            .into_iter()
            .chain(self.directories);
        let locations = main
            .locations
            .in_registration_order()
            .into_iter()
            .chain(self.locations);
        ServerIdentity {
            server_name: self.server_name,
            aliases: self.aliases,
            admin: self.admin.or_else(|| main.admin.clone()),
            port: self.port.unwrap_or(main.port),
            addresses: self.addresses,
            is_virtual: true,
            document_root: self
                .document_root
                .unwrap_or_else(|| main.document_root.clone()),
            access_file_name: self
                .access_file_name
                .unwrap_or_else(|| main.access_file_name.clone()),
            defaults: dir_config::merge(&main.defaults, &self.defaults),
            directories: SectionRegistry::from_sections(directories),
            locations: SectionRegistry::from_sections(locations),
            modules: main.modules.merge(&self.modules),
        }
    }
}

/// Everything parsed from the directive file, shared read-only by requests
#[derive(Debug)]
pub struct StartupConfig {
    pub main: Arc<ServerIdentity>,
    pub virtual_hosts: Vec<Arc<ServerIdentity>>,
    pub log_level: Option<LogLevel>,
}

impl StartupConfig {
    pub fn new(main: ServerBuilder, virtual_hosts: Vec<ServerBuilder>) -> Self {
        let log_level = main.log_level;
        let main = main.finish_main();
        let virtual_hosts = virtual_hosts
            .into_iter()
            .map(|vhost| Arc::new(vhost.finish_virtual(&main)))
            .collect();
        Self {
            main: Arc::new(main),
            virtual_hosts,
            log_level,
        }
    }

    /// Pick the server for a `Host` header value
    pub fn select(&self, host: Option<&str>) -> Arc<ServerIdentity> {
        host.and_then(|h| vhost::resolve_virtual_host(h, &self.virtual_hosts))
            .map_or_else(|| Arc::clone(&self.main), Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::options::Options;
    use crate::scope::section::{Pattern, SectionKind};

    fn section(path: &str) -> Arc<ScopeSection> {
        Arc::new(ScopeSection::new(
            SectionKind::Directory,
            Pattern::literal(SectionKind::Directory, path).unwrap(),
            DirConfig::default(),
        ))
    }

    #[test]
    fn test_virtual_host_inherits() {
        let mut main = ServerBuilder::main(PathBuf::from("/srv/main"));
        main.server_name = Some("main.example".to_string());
        main.port = Some(8080);
        main.directories.push(section("/srv"));

        let mut vhost = ServerBuilder::virtual_host(vec!["*:8080".to_string()]);
        vhost.server_name = Some("www.example.com".to_string());
        vhost.defaults.options.disable(Options::INDEXES);
        vhost.directories.push(section("/srv"));
        vhost.directories.push(section("/"));

        let startup = StartupConfig::new(main, vec![vhost]);
        let v = &startup.virtual_hosts[0];
        assert_eq!(v.port, 8080);
        assert_eq!(v.document_root, PathBuf::from("/srv/main"));
        assert!(!v.defaults.options.value.contains(Options::INDEXES));
        assert!(v.defaults.options.value.contains(Options::EXEC_CGI));
        assert_eq!(v.directories.len(), 3);
        assert_eq!(startup.main.directories.len(), 1);
    }

    #[test]
    fn test_select_by_host() {
        let main = ServerBuilder::main(PathBuf::from("/srv"));
        let mut vhost = ServerBuilder::virtual_host(vec!["*".to_string()]);
        vhost.server_name = Some("docs.example.com".to_string());
        vhost.aliases.push("*.docs.example.com".to_string());
        let startup = StartupConfig::new(main, vec![vhost]);

        assert!(startup.select(Some("docs.example.com:80")).is_virtual);
        assert!(startup.select(Some("a.docs.example.com")).is_virtual);
        assert!(!startup.select(Some("other.example.com")).is_virtual);
        assert!(!startup.select(None).is_virtual);
    }
}
