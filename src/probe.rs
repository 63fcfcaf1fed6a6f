use crate::config::GatewayConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Outer deadline for one CLI health invocation.
const CLI_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Request timeout for the HTTP fallback probe.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a single health check.
///
/// `NotHealthy` and `ProbeError` are handled identically by the loop
/// (keep polling) but stay distinct for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    NotHealthy,
    ProbeError(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

/// A health check the guardian loop can poll.
///
/// Implementations must never fail out of the loop: every failure mode
/// maps into a `ProbeOutcome`.
pub trait Probe {
    fn check(&self) -> impl std::future::Future<Output = ProbeOutcome> + Send;
}

/// Two-tier gateway health probe.
///
/// Prefers the structured `openclaw health --json` command when a binary
/// was resolved; otherwise falls back to an HTTP GET against the
/// gateway's /health endpoint.
pub struct GatewayProbe {
    bin: Option<PathBuf>,
    health_url: String,
    client: reqwest::Client,
}

impl GatewayProbe {
    pub fn new(bin: Option<PathBuf>, gateway: &GatewayConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_PROBE_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            bin,
            health_url: format!("http://{}:{}/health", gateway.host, gateway.port),
            client,
        })
    }

    /// Structured tier: `<bin> health --json --timeout 5000`.
    ///
    /// Exit 0 with JSON reporting `ok: true` or `status: "ok"` is healthy.
    /// A nonzero exit or unparseable stdout is merely not-yet-healthy;
    /// only spawn failures and the outer deadline count as probe errors.
    async fn check_cli(&self, bin: &std::path::Path) -> ProbeOutcome {
        let output = tokio::time::timeout(
            CLI_PROBE_TIMEOUT,
            Command::new(bin)
                .args(["health", "--json", "--timeout", "5000"])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match output {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    return ProbeOutcome::NotHealthy;
                }
                match serde_json::from_slice::<serde_json::Value>(&output.stdout) {
                    Ok(data) => {
                        let healthy = data.get("ok").and_then(|v| v.as_bool()).unwrap_or(false)
                            || data.get("status").and_then(|v| v.as_str()) == Some("ok");
                        if healthy {
                            ProbeOutcome::Healthy
                        } else {
                            ProbeOutcome::NotHealthy
                        }
                    }
                    Err(_) => ProbeOutcome::NotHealthy,
                }
            }
            Ok(Err(e)) => ProbeOutcome::ProbeError(format!("health command failed to run: {e}")),
            Err(_) => ProbeOutcome::ProbeError(format!(
                "health command timed out after {}s",
                CLI_PROBE_TIMEOUT.as_secs()
            )),
        }
    }

    /// HTTP tier: any 2xx response whose body contains "ok" is healthy.
    async fn check_http(&self) -> ProbeOutcome {
        match self.client.get(&self.health_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) if body.to_lowercase().contains("ok") => ProbeOutcome::Healthy,
                Ok(_) => ProbeOutcome::NotHealthy,
                Err(e) => ProbeOutcome::ProbeError(format!("failed to read health body: {e}")),
            },
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "health endpoint returned non-success");
                ProbeOutcome::NotHealthy
            }
            Err(e) => ProbeOutcome::ProbeError(format!("health request failed: {e}")),
        }
    }
}

impl Probe for GatewayProbe {
    async fn check(&self) -> ProbeOutcome {
        match &self.bin {
            Some(bin) => self.check_cli(bin).await,
            None => self.check_http().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_health_bin(dir: &Path, script_body: &str) -> PathBuf {
        let path = dir.join("openclaw");
        std::fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn probe_with_bin(bin: Option<PathBuf>) -> GatewayProbe {
        GatewayProbe::new(bin, &GatewayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_cli_probe_ok_true_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_health_bin(dir.path(), r#"echo '{"ok": true}'"#);
        let probe = probe_with_bin(Some(bin));
        assert_eq!(probe.check().await, ProbeOutcome::Healthy);
    }

    #[tokio::test]
    async fn test_cli_probe_status_ok_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_health_bin(dir.path(), r#"echo '{"status": "ok"}'"#);
        let probe = probe_with_bin(Some(bin));
        assert_eq!(probe.check().await, ProbeOutcome::Healthy);
    }

    #[tokio::test]
    async fn test_cli_probe_ok_false_is_not_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_health_bin(dir.path(), r#"echo '{"ok": false}'"#);
        let probe = probe_with_bin(Some(bin));
        assert_eq!(probe.check().await, ProbeOutcome::NotHealthy);
    }

    #[tokio::test]
    async fn test_cli_probe_garbage_stdout_is_not_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_health_bin(dir.path(), "echo starting up...");
        let probe = probe_with_bin(Some(bin));
        assert_eq!(probe.check().await, ProbeOutcome::NotHealthy);
    }

    #[tokio::test]
    async fn test_cli_probe_nonzero_exit_is_not_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_health_bin(dir.path(), "exit 3");
        let probe = probe_with_bin(Some(bin));
        assert_eq!(probe.check().await, ProbeOutcome::NotHealthy);
    }

    #[tokio::test]
    async fn test_cli_probe_missing_binary_is_probe_error() {
        let probe = probe_with_bin(Some(PathBuf::from("/nonexistent/openclaw")));
        match probe.check().await {
            ProbeOutcome::ProbeError(reason) => {
                assert!(reason.contains("failed to run"));
            }
            other => panic!("expected ProbeError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused_is_probe_error() {
        // Bind then drop a listener to get a port with nothing behind it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let gateway = GatewayConfig {
            port,
            ..GatewayConfig::default()
        };
        let probe = GatewayProbe::new(None, &gateway).unwrap();
        match probe.check().await {
            ProbeOutcome::ProbeError(reason) => {
                assert!(reason.contains("health request failed"));
            }
            other => panic!("expected ProbeError, got {other:?}"),
        }
    }

    async fn one_shot_http_server(response: &'static str) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_http_probe_ok_body_is_healthy() {
        let port =
            one_shot_http_server("HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                .await;
        let gateway = GatewayConfig {
            port,
            ..GatewayConfig::default()
        };
        let probe = GatewayProbe::new(None, &gateway).unwrap();
        assert_eq!(probe.check().await, ProbeOutcome::Healthy);
    }

    #[tokio::test]
    async fn test_http_probe_body_without_marker_is_not_healthy() {
        let port = one_shot_http_server(
            "HTTP/1.1 200 OK\r\ncontent-length: 8\r\nconnection: close\r\n\r\nstarting",
        )
        .await;
        let gateway = GatewayConfig {
            port,
            ..GatewayConfig::default()
        };
        let probe = GatewayProbe::new(None, &gateway).unwrap();
        assert_eq!(probe.check().await, ProbeOutcome::NotHealthy);
    }

    #[tokio::test]
    async fn test_http_probe_server_error_is_not_healthy() {
        let port = one_shot_http_server(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let gateway = GatewayConfig {
            port,
            ..GatewayConfig::default()
        };
        let probe = GatewayProbe::new(None, &gateway).unwrap();
        assert_eq!(probe.check().await, ProbeOutcome::NotHealthy);
    }
}
