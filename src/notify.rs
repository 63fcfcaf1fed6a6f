use crate::config::{GatewayConfig, GuardConfig, NotificationConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for all notification calls.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery status for one channel attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The channel accepted the message.
    Sent,
    /// The call was made and failed, or the remote rejected it.
    Failed,
    /// No credential resolved; no network call was attempted.
    NoCredential,
    /// The channel identifier is unknown or incomplete.
    NotConfigured,
}

/// What happened during one dispatch: the primary attempt, and the single
/// fallback attempt if the primary did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub primary: Delivery,
    pub fallback: Option<Delivery>,
}

/// Prioritized notification dispatcher.
///
/// Tries the primary channel (the in-process gateway message relay),
/// then at most one configured fallback webhook. Every failure is
/// absorbed here; dispatch never propagates an error to the loop.
pub struct Notifier {
    gateway: GatewayConfig,
    notification: NotificationConfig,
    dotenv_path: PathBuf,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: &GuardConfig) -> Result<Self, String> {
        let dotenv_path = crate::config::expand_tilde(Path::new("~/.openclaw/.env"));
        Self::with_dotenv_path(config, dotenv_path)
    }

    /// Construct with an explicit dotfile path for credential fallback.
    pub fn with_dotenv_path(config: &GuardConfig, dotenv_path: PathBuf) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            gateway: config.gateway.clone(),
            notification: config.notification.clone(),
            dotenv_path,
            client,
        })
    }

    /// Deliver the outcome message: primary first, then the single
    /// configured fallback. Fallback failure is logged and absorbed.
    pub async fn dispatch(&self, message: &str) -> DispatchReport {
        let primary = match self.notification.primary.as_str() {
            "openclaw" => self.send_openclaw(message).await,
            other => {
                warn!(channel = other, "unknown primary notification channel");
                Delivery::NotConfigured
            }
        };
        if primary == Delivery::Sent {
            return DispatchReport {
                primary,
                fallback: None,
            };
        }

        let fallback_channel = self.notification.fallback.as_str();
        if fallback_channel.is_empty() {
            debug!("primary notification not delivered and no fallback configured");
            return DispatchReport {
                primary,
                fallback: None,
            };
        }

        let fallback = self.send_fallback(fallback_channel, message).await;
        if fallback != Delivery::Sent {
            warn!(
                channel = fallback_channel,
                status = ?fallback,
                "fallback notification not delivered"
            );
        }
        DispatchReport {
            primary,
            fallback: Some(fallback),
        }
    }

    /// Primary channel: POST to the gateway's tool-invoke endpoint with
    /// bearer auth. No resolvable token means fail fast without a call.
    async fn send_openclaw(&self, message: &str) -> Delivery {
        let Some(token) = self.resolve_secret(&self.gateway.auth_token_env) else {
            warn!(
                env = %self.gateway.auth_token_env,
                "no gateway auth token resolvable, skipping primary notification"
            );
            return Delivery::NoCredential;
        };

        let mut args = serde_json::json!({
            "action": "send",
            "message": message,
        });
        if !self.notification.openclaw.channel.is_empty() {
            args["channel"] = serde_json::json!(self.notification.openclaw.channel);
        }
        if !self.notification.openclaw.to.is_empty() {
            args["to"] = serde_json::json!(self.notification.openclaw.to);
        }
        let payload = serde_json::json!({
            "tool": "message",
            "args": args,
            "sessionKey": "main",
        });

        let url = format!(
            "http://{}:{}/tools/invoke",
            self.gateway.host, self.gateway.port
        );
        match self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => Delivery::Sent,
            Ok(resp) => {
                warn!(status = %resp.status(), "gateway notification rejected");
                Delivery::Failed
            }
            Err(e) => {
                warn!(error = %e, "gateway notification failed");
                Delivery::Failed
            }
        }
    }

    async fn send_fallback(&self, channel: &str, message: &str) -> Delivery {
        match channel {
            "telegram" => self.send_telegram(message).await,
            "slack" => {
                self.send_webhook(&self.notification.slack.webhook_url_env, "text", message)
                    .await
            }
            "discord" => {
                self.send_webhook(&self.notification.discord.webhook_url_env, "content", message)
                    .await
            }
            other => {
                warn!(channel = other, "unknown fallback notification channel");
                Delivery::NotConfigured
            }
        }
    }

    async fn send_telegram(&self, message: &str) -> Delivery {
        let chat_id = &self.notification.telegram.chat_id;
        let Some(token) = self.resolve_secret(&self.notification.telegram.bot_token_env) else {
            return Delivery::NoCredential;
        };
        if chat_id.is_empty() {
            return Delivery::NoCredential;
        }

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let form = [("chat_id", chat_id.as_str()), ("text", message)];
        match self.client.post(&url).form(&form).send().await {
            Ok(resp) if resp.status().is_success() => Delivery::Sent,
            Ok(_) | Err(_) => Delivery::Failed,
        }
    }

    /// Slack and Discord share the same shape: resolve the webhook URL
    /// from its env key, POST a one-field JSON body.
    async fn send_webhook(&self, url_env: &str, field: &str, message: &str) -> Delivery {
        let Some(url) = self.resolve_secret(url_env) else {
            return Delivery::NoCredential;
        };
        let mut body = serde_json::Map::new();
        body.insert(
            field.to_string(),
            serde_json::Value::String(message.to_string()),
        );
        let body = serde_json::Value::Object(body);
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => Delivery::Sent,
            Ok(_) | Err(_) => Delivery::Failed,
        }
    }

    /// Resolve a secret: environment variable first, then the local
    /// dotfile key-value store.
    fn resolve_secret(&self, env_key: &str) -> Option<String> {
        if env_key.is_empty() {
            return None;
        }
        if let Ok(value) = std::env::var(env_key) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        dotenv_get(&self.dotenv_path, env_key)
    }
}

/// Look up `KEY=value` in a dotfile. Returns None when the file is
/// missing, the key is absent, or the value is empty.
fn dotenv_get(path: &Path, key: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let prefix = format!("{key}=");
    contents
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}
