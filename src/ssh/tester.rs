//! One-shot connection tester
//!
//! Connect + authenticate + immediate disconnect, without touching the
//! session registry. The hard timeout races the whole probe; because the
//! race is a single `tokio::time::timeout` expression there is structurally
//! at most one outcome per test.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::client::SshClient;
use super::config::HostDescriptor;
use super::error::SshError;

/// Hard ceiling for a connection test. Deliberately shorter than the
/// default per-session connect timeout (20s).
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a connection test
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub message: String,
}

/// Probe a host: transport + auth only, no shell, no SFTP.
pub async fn test(host: &HostDescriptor) -> TestOutcome {
    test_with_timeout(host, TEST_TIMEOUT).await
}

/// Probe with an explicit timeout ceiling.
pub async fn test_with_timeout(host: &HostDescriptor, limit: Duration) -> TestOutcome {
    match tokio::time::timeout(limit, probe(host)).await {
        Ok(Ok(())) => TestOutcome {
            success: true,
            message: "Connection successful".to_string(),
        },
        Ok(Err(e)) => TestOutcome {
            success: false,
            message: e.to_string(),
        },
        Err(_) => TestOutcome {
            success: false,
            message: format!("Connection test timed out after {:?}", limit),
        },
    }
}

async fn probe(host: &HostDescriptor) -> Result<(), SshError> {
    let handle = SshClient::new(host.clone()).connect().await?;
    info!("Connection test succeeded for {}:{}", host.host, host.port);
    let _ = handle
        .disconnect(russh::Disconnect::ByApplication, "Connection test", "en")
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::config::AuthMethod;
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn host_for(port: u16) -> HostDescriptor {
        HostDescriptor {
            host: "127.0.0.1".to_string(),
            port,
            username: "nobody".to_string(),
            auth: AuthMethod::password("wrong"),
            // Inner connect timeout longer than the outer test ceiling so the
            // outer race is what fires.
            timeout_secs: 30,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn refused_port_reports_failure() {
        // Bind then drop to get a port that actively refuses.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = test_with_timeout(&host_for(port), Duration::from_secs(5)).await;
        assert!(!outcome.success);
        assert!(!outcome.message.is_empty());
    }

    #[tokio::test]
    async fn silent_host_fails_within_timeout_window() {
        // Accepts TCP but never speaks SSH.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let started = Instant::now();
        let outcome = test_with_timeout(&host_for(port), Duration::from_millis(500)).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
