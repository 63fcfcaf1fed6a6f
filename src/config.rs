use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from restart-guard.toml.
///
/// Built once at startup and read-only afterward. Every key has a
/// documented default; unknown keys are ignored.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    pub paths: PathsConfig,
    pub guardian: GuardianConfig,
    pub gateway: GatewayConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Sentinel file marking an in-flight restart-monitoring run.
    pub lock_file: PathBuf,
    /// Append-only log receiving one line per run.
    pub restart_log: PathBuf,
    /// Explicit openclaw binary path; empty means resolve via PATH / nvm.
    pub openclaw_bin: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Seconds between health probes.
    pub poll_interval: u64,
    /// Wall-clock deadline in seconds before giving up.
    pub timeout: u64,
    /// Shell commands run on the timeout path. Accepts a single string
    /// or a list; a string is normalized to a one-element list.
    #[serde(deserialize_with = "string_or_list")]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Name of the environment variable holding the gateway auth token.
    pub auth_token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Primary delivery channel identifier.
    pub primary: String,
    /// Single fallback channel identifier ("telegram" | "slack" | "discord"),
    /// or empty for none.
    pub fallback: String,
    pub openclaw: OpenclawChannelConfig,
    pub telegram: TelegramConfig,
    pub slack: SlackConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenclawChannelConfig {
    /// Optional message channel passed to the gateway message tool.
    pub channel: String,
    /// Optional recipient passed to the gateway message tool.
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token_env: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub webhook_url_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url_env: String,
}

// --- Default implementations ---

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from("/tmp/restart-guard.lock"),
            restart_log: PathBuf::from("~/.openclaw/net/work/restart.log"),
            openclaw_bin: String::new(),
        }
    }
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            poll_interval: 3,
            timeout: 120,
            diagnostics: vec![
                "openclaw doctor --non-interactive".to_string(),
                "openclaw logs --tail 30".to_string(),
            ],
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18789,
            auth_token_env: "GATEWAY_AUTH_TOKEN".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            primary: "openclaw".to_string(),
            fallback: String::new(),
            openclaw: OpenclawChannelConfig::default(),
            telegram: TelegramConfig::default(),
            slack: SlackConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id: String::new(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url_env: "SLACK_WEBHOOK_URL".to_string(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url_env: "DISCORD_WEBHOOK_URL".to_string(),
        }
    }
}

/// Load and parse the config file, expanding `~` in path values.
pub fn load(path: &Path) -> Result<GuardConfig, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let mut config: GuardConfig = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;

    if config.notification.primary.is_empty() {
        config.notification.primary = "openclaw".to_string();
    }
    config.paths.lock_file = expand_tilde(&config.paths.lock_file);
    config.paths.restart_log = expand_tilde(&config.paths.restart_log);
    Ok(config)
}

/// Expand a leading `~` component to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

/// Deserialize either a bare string or a list of strings into a Vec.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(cmd) => vec![cmd],
        OneOrMany::Many(cmds) => cmds,
    })
}
