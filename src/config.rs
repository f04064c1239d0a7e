use crate::constants::*;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    /// Address advertised in PASV replies. Defaults to the control socket's local address.
    pub pasv_address: Option<String>,
    pub data_start_port: u16,
    pub data_ports_range: u32,
    pub timeout_seconds: u64,
    pub max_connections: usize,
    pub upload_buffer_size: usize,
    pub banner: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: DEFAULT_LISTEN_PORT,
            pasv_address: None,
            data_start_port: DEFAULT_DATA_START_PORT,
            data_ports_range: DEFAULT_DATA_PORTS_RANGE,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            upload_buffer_size: DEFAULT_UPLOAD_BUFFER_SIZE,
            banner: format!("{} ready.", SERVER_NAME),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            url: String::from("postgres://postgres@localhost/rouilleblobd"),
            pool_size: DEFAULT_DB_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub tick_millis: u64,
    pub session_ttl_ticks: i64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            tick_millis: DEFAULT_TICK_MILLIS,
            session_ttl_ticks: DEFAULT_SESSION_TTL_TICKS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub liveness: LivenessConfig,
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.data_ports_range == 0 {
            bail!("server.data_ports_range must be at least 1");
        }
        if u32::from(server.data_start_port) + server.data_ports_range > u32::from(u16::MAX) + 1 {
            bail!(
                "data ports {}..{} do not fit in the u16 port space",
                server.data_start_port,
                u32::from(server.data_start_port) + server.data_ports_range
            );
        }
        if let Some(addr) = &server.pasv_address {
            addr.parse::<Ipv4Addr>()
                .with_context(|| format!("server.pasv_address {} is not an IPv4 address", addr))?;
        }
        if server.timeout_seconds == 0 {
            bail!("server.timeout_seconds must be at least 1");
        }
        if server.max_connections == 0 {
            bail!("server.max_connections must be at least 1");
        }
        if server.upload_buffer_size == 0 {
            bail!("server.upload_buffer_size must be at least 1");
        }
        if self.database.pool_size == 0 {
            bail!("database.pool_size must be at least 1");
        }
        if self.liveness.tick_millis == 0 {
            bail!("liveness.tick_millis must be at least 1");
        }
        if self.liveness.session_ttl_ticks < 1 {
            bail!("liveness.session_ttl_ticks must be at least 1");
        }
        Ok(())
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_seconds)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.liveness.tick_millis)
    }

    /// Number of data ports, validated to fit the u16 space.
    pub fn data_ports_range(&self) -> u16 {
        u16::try_from(self.server.data_ports_range).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = write_config("");
        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.listen_port, 45632);
        assert_eq!(config.server.data_start_port, 22323);
        assert_eq!(config.server.data_ports_range, 20000);
        assert_eq!(config.server.timeout_seconds, 20);
        assert_eq!(config.server.max_connections, 32);
        assert_eq!(config.database.pool_size, 10);
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert!(config.server.pasv_address.is_none());
    }

    #[test]
    fn test_partial_sections_override_defaults() {
        let file = write_config(
            r#"
            [server]
            listen_port = 2121
            pasv_address = "10.0.0.5"

            [database]
            backend = "memory"
            pool_size = 3

            [liveness]
            session_ttl_ticks = 60
            "#,
        );
        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.listen_port, 2121);
        assert_eq!(config.server.pasv_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.server.timeout_seconds, 20);
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.pool_size, 3);
        assert_eq!(config.liveness.session_ttl_ticks, 60);
        assert_eq!(config.liveness.tick_millis, 1000);
    }

    #[test]
    fn test_port_range_overflowing_u16_is_rejected() {
        let mut config = Config::default();
        config.server.data_start_port = 60000;
        config.server.data_ports_range = 10000;
        assert!(config.validate().is_err());

        config.server.data_ports_range = 5536;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pasv_address_must_be_ipv4() {
        let mut config = Config::default();
        config.server.pasv_address = Some("::1".to_string());
        assert!(config.validate().is_err());

        config.server.pasv_address = Some("203.0.113.7".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let file = write_config("[database]\npool_size = 0\n");
        assert!(Config::load_from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_missing_file_reports_the_path() {
        let err = Config::load_from_file("/nonexistent/rouilleblobd.conf").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/rouilleblobd.conf"));
    }
}
