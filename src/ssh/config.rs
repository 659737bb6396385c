//! Connection configuration
//!
//! A [`HostDescriptor`] carries everything needed to open one transport
//! connection. It is immutable once handed to the engine; persisting and
//! mutating host records is the host-store collaborator's concern.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use serde::{Deserialize, Serialize};

/// Host connection descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication method
    pub auth: AuthMethod,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Terminal columns
    #[serde(default = "default_cols")]
    pub cols: u32,

    /// Terminal rows
    #[serde(default = "default_rows")]
    pub rows: u32,
}

/// Authentication methods supported
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    /// Password authentication
    Password { password: String },

    /// SSH key authentication
    Key {
        /// Private key material (PEM/OpenSSH text)
        private_key: String,
        /// Optional passphrase for encrypted keys
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: password.into(),
        }
    }

    pub fn key(private_key: impl Into<String>, passphrase: Option<String>) -> Self {
        Self::Key {
            private_key: private_key.into(),
            passphrase,
        }
    }
}

impl HostDescriptor {
    /// Build the russh client config for this host.
    ///
    /// Keepalive every 30s, disconnect after 3 missed probes. Window and
    /// packet sizes are raised from the russh defaults for throughput.
    pub fn transport_config(&self) -> Arc<client::Config> {
        let config = client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            inactivity_timeout: Some(Duration::from_secs(600)),
            window_size: 2 * 1024 * 1024,
            maximum_packet_size: 32 * 1024,
            ..Default::default()
        };
        Arc::new(config)
    }
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    20
}

fn default_cols() -> u32 {
    80
}

fn default_rows() -> u32 {
    24
}

impl Default for HostDescriptor {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            auth: AuthMethod::Password {
                password: String::new(),
            },
            timeout_secs: 20,
            cols: 80,
            rows: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_applies_defaults() {
        let json = r#"{
            "host": "example.com",
            "username": "deploy",
            "auth": { "type": "password", "password": "secret" }
        }"#;
        let desc: HostDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.port, 22);
        assert_eq!(desc.timeout_secs, 20);
        assert_eq!(desc.cols, 80);
        assert_eq!(desc.rows, 24);
    }

    #[test]
    fn deserialize_key_auth() {
        let json = r#"{
            "host": "example.com",
            "port": 2222,
            "username": "deploy",
            "auth": { "type": "key", "private_key": "-----BEGIN...", "passphrase": null }
        }"#;
        let desc: HostDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.port, 2222);
        assert!(matches!(desc.auth, AuthMethod::Key { .. }));
    }
}
