//! Hortabot configuration loader.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then environment variables (`.env` is loaded by `main`).

use anyhow::Result;
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "hortabot.toml";
pub const DEFAULT_PROMPT_PREFIX: &str =
    "Answer the message as a horticultural therapy advisor: ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HortabotConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub gateway: GatewayConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: u16,
    pub generation_url: String,
    pub model: String,
    pub generation_timeout_seconds: u64,
    pub prompt_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            generation_url: hb_llm::DEFAULT_GENERATION_URL.to_string(),
            model: hb_llm::DEFAULT_MODEL.to_string(),
            generation_timeout_seconds: hb_llm::DEFAULT_GENERATION_TIMEOUT.as_secs(),
            prompt_prefix: DEFAULT_PROMPT_PREFIX.to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    pub client_id: String,
    pub client_secret: String,
    /// Defaults to `http://localhost:<port>/oauth2callback`.
    pub redirect_uri: Option<String>,
    /// Base URL users reach the gateway on; used for `authorize_url` hints.
    pub public_url: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub tasks_api_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3002,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
            public_url: None,
            authorize_url: hb_tasks::GOOGLE_AUTHORIZE_URL.to_string(),
            token_url: hb_tasks::GOOGLE_TOKEN_URL.to_string(),
            tasks_api_url: hb_tasks::GOOGLE_TASKS_API_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/oauth2callback", self.port))
    }

    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
            .trim_end_matches('/')
            .to_string()
    }

    /// Where a user is sent to grant task access.
    pub fn authorize_hint(&self) -> String {
        format!("{}/authorize", self.public_url())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("public_url", &self.public_url)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("tasks_api_url", &self.tasks_api_url)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub bot_token: String,
    pub instructions_agent_url: String,
    pub tasks_agent_url: String,
    pub default_list_name: String,
    pub routine_list_name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            instructions_agent_url: "http://localhost:3000/ia".to_string(),
            tasks_agent_url: "http://localhost:3002".to_string(),
            default_list_name: "Hortotherapy".to_string(),
            routine_list_name: "Hortotherapy routine".to_string(),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &redacted(&self.bot_token))
            .field("instructions_agent_url", &self.instructions_agent_url)
            .field("tasks_agent_url", &self.tasks_agent_url)
            .field("default_list_name", &self.default_list_name)
            .field("routine_list_name", &self.routine_list_name)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

impl HortabotConfig {
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut cfg = match resolve_config_path(path) {
            Some(path) => Self::from_file(&path).await?,
            None => {
                tracing::debug!("no config file found; using built-in defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        let cfg: HortabotConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;
        tracing::info!(config_path = %path.display(), "config file loaded");
        Ok(cfg)
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("BIND_HOST") {
            self.server.bind_host = v.trim().to_string();
        }

        if let Some(v) = var("INSTRUCTIONS_AGENT_PORT") {
            self.relay.port = parse_number("INSTRUCTIONS_AGENT_PORT", &v)?;
        }
        if let Some(v) = var("GENERATION_URL") {
            self.relay.generation_url = v;
        }
        if let Some(v) = var("GENERATION_MODEL") {
            self.relay.model = v;
        }
        if let Some(v) = var("GENERATION_TIMEOUT_SECS") {
            self.relay.generation_timeout_seconds = parse_number("GENERATION_TIMEOUT_SECS", &v)?;
        }
        // The prefix may legitimately end in whitespace, so it is not trimmed.
        if let Some(v) = var("RELAY_PROMPT_PREFIX") {
            self.relay.prompt_prefix = v;
        }

        if let Some(v) = var("GOOGLE_TASKS_AGENT_PORT") {
            self.gateway.port = parse_number("GOOGLE_TASKS_AGENT_PORT", &v)?;
        }
        if let Some(v) = var("ID_CLIENT") {
            self.gateway.client_id = v.trim().to_string();
        }
        if let Some(v) = var("SECRET_KEY") {
            self.gateway.client_secret = v.trim().to_string();
        }
        if let Some(v) = var("GOOGLE_REDIRECT_URI") {
            self.gateway.redirect_uri = Some(v.trim().to_string());
        }
        if let Some(v) = var("TASKS_AGENT_PUBLIC_URL") {
            self.gateway.public_url = Some(v.trim().to_string());
        }
        if let Some(v) = var("GOOGLE_OAUTH_AUTHORIZE_URL") {
            self.gateway.authorize_url = v.trim().to_string();
        }
        if let Some(v) = var("GOOGLE_OAUTH_TOKEN_URL") {
            self.gateway.token_url = v.trim().to_string();
        }
        if let Some(v) = var("GOOGLE_TASKS_API_URL") {
            self.gateway.tasks_api_url = v.trim().to_string();
        }

        if let Some(v) = var("BOT_TOKEN") {
            self.bot.bot_token = v.trim().to_string();
        }
        if let Some(v) = var("INSTRUCTIONS_AGENT_URL") {
            self.bot.instructions_agent_url = v.trim().to_string();
        }
        if let Some(v) = var("TASKS_AGENT_URL") {
            self.bot.tasks_agent_url = v.trim().to_string();
        }
        if let Some(v) = var("DEFAULT_LIST_NAME") {
            self.bot.default_list_name = v.trim().to_string();
        }
        if let Some(v) = var("ROUTINE_LIST_NAME") {
            self.bot.routine_list_name = v.trim().to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_host
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "server.bind_host must be an IP address, got {:?}",
                    self.server.bind_host
                )
            })?;

        if self.relay.port == 0 {
            return Err(anyhow::anyhow!("relay.port must be > 0"));
        }
        if self.relay.model.trim().is_empty() {
            return Err(anyhow::anyhow!("relay.model is required"));
        }
        if self.relay.generation_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "relay.generation_timeout_seconds must be > 0"
            ));
        }
        require_url("relay.generation_url", &self.relay.generation_url)?;

        if self.gateway.port == 0 {
            return Err(anyhow::anyhow!("gateway.port must be > 0"));
        }
        require_url("gateway.redirect_uri", &self.gateway.redirect_uri())?;
        require_url("gateway.public_url", &self.gateway.public_url())?;
        require_url("gateway.authorize_url", &self.gateway.authorize_url)?;
        require_url("gateway.token_url", &self.gateway.token_url)?;
        require_url("gateway.tasks_api_url", &self.gateway.tasks_api_url)?;

        require_url("bot.instructions_agent_url", &self.bot.instructions_agent_url)?;
        require_url("bot.tasks_agent_url", &self.bot.tasks_agent_url)?;
        if self.bot.default_list_name.trim().is_empty() {
            return Err(anyhow::anyhow!("bot.default_list_name is required"));
        }
        if self.bot.routine_list_name.trim().is_empty() {
            return Err(anyhow::anyhow!("bot.routine_list_name is required"));
        }
        Ok(())
    }

    pub fn require_gateway_credentials(&self) -> Result<()> {
        if self.gateway.client_id.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "gateway.client_id is required (set ID_CLIENT)"
            ));
        }
        if self.gateway.client_secret.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "gateway.client_secret is required (set SECRET_KEY)"
            ));
        }
        Ok(())
    }

    pub fn require_bot_token(&self) -> Result<()> {
        if self.bot.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("bot.bot_token is required (set BOT_TOKEN)"));
        }
        Ok(())
    }

    pub fn relay_addr(&self) -> Result<SocketAddr> {
        self.socket_addr(self.relay.port)
    }

    pub fn gateway_addr(&self) -> Result<SocketAddr> {
        self.socket_addr(self.gateway.port)
    }

    fn socket_addr(&self, port: u16) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .bind_host
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("server.bind_host: {e}"))?;
        Ok(SocketAddr::new(ip, port))
    }
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
        candidate.is_file().then_some(candidate)
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a number, got {raw:?}"))
}

fn require_url(key: &str, raw: &str) -> Result<()> {
    Url::parse(raw.trim()).map_err(|e| anyhow::anyhow!("{key} is not a valid URL: {e}"))?;
    Ok(())
}
