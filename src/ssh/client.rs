//! SSH Client implementation using russh

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use tracing::{debug, info};

use super::config::{AuthMethod, HostDescriptor};
use super::error::SshError;

/// SSH client: one connect + authenticate round per call
pub struct SshClient {
    config: HostDescriptor,
}

impl SshClient {
    pub fn new(config: HostDescriptor) -> Self {
        Self { config }
    }

    /// Connect to the SSH server, authenticate, and return the transport handle
    pub async fn connect(self) -> Result<Handle<ClientHandler>, SshError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!("Connecting to SSH server at {}", addr);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed("No address found".to_string()))?;

        let ssh_config = self.config.transport_config();

        let mut handle = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            client::connect(ssh_config, socket_addr, ClientHandler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))?
        .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

        debug!("SSH handshake completed");

        let authenticated = match &self.config.auth {
            AuthMethod::Password { password } => {
                if password.is_empty() {
                    return Err(SshError::AuthenticationFailed(
                        "Password is required for password authentication".to_string(),
                    ));
                }
                handle
                    .authenticate_password(&self.config.username, password)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
            AuthMethod::Key {
                private_key,
                passphrase,
            } => {
                if private_key.is_empty() {
                    return Err(SshError::AuthenticationFailed(
                        "Private key is required for key authentication".to_string(),
                    ));
                }
                let key = russh::keys::decode_secret_key(private_key, passphrase.as_deref())?;
                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);

                handle
                    .authenticate_publickey(&self.config.username, key_with_hash)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }

        info!("SSH authentication successful for {}", addr);

        Ok(handle)
    }
}

/// Client handler for russh callbacks
pub struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: verify against a known-hosts store once one exists at this layer
        Ok(true)
    }
}
