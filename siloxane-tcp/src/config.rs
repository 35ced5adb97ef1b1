use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::TcpError;

/// Largest frame accepted from the server unless configured otherwise.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Connection settings, usually read from a TOML file:
///
/// ```toml
/// address = "127.0.0.1:8087"
/// read_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub address: String,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub max_frame_size: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8087".to_string(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl TcpConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TcpError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TcpError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = TcpConfig::from_toml_str(r#"address = "db.local:8087""#).unwrap();
        assert_eq!(config.address, "db.local:8087");
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn timeouts_are_milliseconds() {
        let config = TcpConfig::from_toml_str(
            "connect_timeout_ms = 250\nread_timeout_ms = 1000\nwrite_timeout_ms = 2000\n",
        )
        .unwrap();
        assert_eq!(config.address, "127.0.0.1:8087");
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.write_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = TcpConfig::from_toml_str("max_frame_size = \"big\"").unwrap_err();
        assert!(matches!(err, TcpError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"10.0.0.1:8087\"\nmax_frame_size = 1024").unwrap();

        let config = TcpConfig::load(file.path()).unwrap();
        assert_eq!(config.address, "10.0.0.1:8087");
        assert_eq!(config.max_frame_size, 1024);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = TcpConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, TcpError::Io(_)));
    }
}
