//! Server configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted message unless configured otherwise (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub version: String,
    pub socket_path: String,
    pub log_level: String,
    /// Upper bound for a single newline-delimited message on the socket.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Reject parameters that decode to their type's default value.
    #[serde(default = "default_reject_zero_params")]
    pub reject_zero_params: bool,
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

fn default_reject_zero_params() -> bool {
    true
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.trim().is_empty() {
            return Err(Error::Validation("Socket path cannot be empty".to_string()));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.max_message_bytes == 0 {
            return Err(Error::Validation(
                "Max message size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            socket_path: "/tmp/rpcwire.sock".to_string(),
            log_level: "info".to_string(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            reject_zero_params: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.version, "1.0.0");
        assert!(config.reject_zero_params);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServerConfig::default();

        config.socket_path = "".to_string();
        assert!(config.validate().is_err());

        config.socket_path = "/tmp/test.sock".to_string();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.log_level = "debug".to_string();
        config.max_message_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"version":"1.0.0","socket_path":"/tmp/x.sock","log_level":"warn"}"#,
        )
        .unwrap();
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
        assert!(config.reject_zero_params);
    }
}
