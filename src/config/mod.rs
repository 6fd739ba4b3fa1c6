// Configuration module entry point
// Runtime settings plus the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub use state::AppState;
pub use types::{LoggingConfig, PerformanceConfig, ServerConfig, Settings};

/// Default settings file, without extension
pub const DEFAULT_SETTINGS_PATH: &str = "scopehttpd";

impl Settings {
    /// Load settings from the given file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SCOPEHTTPD").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.config_file", "conf/httpd.conf")?
            .set_default("server.server_root", ".")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.mmap_threshold", 1)?
            .set_default("performance.max_internal_redirects", 10)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn server_root(&self) -> PathBuf {
        PathBuf::from(&self.server.server_root)
    }

    /// Directive file path, resolved against the server root
    pub fn directive_file(&self) -> PathBuf {
        let path = Path::new(&self.server.config_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.server_root().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_file() {
        let settings = Settings::load_from("/nonexistent/scopehttpd-settings").unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.performance.mmap_threshold, 1);
        assert_eq!(settings.performance.max_internal_redirects, 10);
        assert_eq!(settings.logging.access_log_format, "combined");
        assert_eq!(
            settings.directive_file(),
            PathBuf::from("./conf/httpd.conf")
        );
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9090\nconfig_file = \"/etc/scope/httpd.conf\"\n\n[performance]\nmmap_threshold = 4096\n",
        )
        .unwrap();
        let base = dir.path().join("settings");
        let settings = Settings::load_from(base.to_str().unwrap()).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.performance.mmap_threshold, 4096);
        assert_eq!(
            settings.directive_file(),
            PathBuf::from("/etc/scope/httpd.conf")
        );
        assert!(settings.get_socket_addr().is_ok());
    }
}
