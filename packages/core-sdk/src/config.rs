use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};

use crate::models::Credential;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_CREDENTIAL_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/**
 * \brief Relay settings. The secret itself is not stored here, see `CredentialSource`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /** \brief Full chat-completion endpoint URL. */
    pub upstream_url: String,
    /** \brief Model used when the caller does not name one. */
    pub default_model: String,
    /** \brief Environment variable holding the bearer token. */
    pub credential_env: String,
    /** \brief Time budget of one upstream call. */
    pub timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RelayConfig {
    /**
     * \brief Defaults overlaid with RELAY_* environment variables.
     */
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let upstream_url =
            std::env::var("RELAY_UPSTREAM_URL").unwrap_or_else(|_| defaults.upstream_url);
        let default_model =
            std::env::var("RELAY_DEFAULT_MODEL").unwrap_or_else(|_| defaults.default_model);
        let credential_env =
            std::env::var("RELAY_CREDENTIAL_ENV").unwrap_or_else(|_| defaults.credential_env);
        let timeout = match std::env::var("RELAY_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => defaults.timeout,
        };
        Ok(Self {
            upstream_url,
            default_model,
            credential_env,
            timeout,
        })
    }
}

pub fn parse_timeout(raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid timeout seconds: {:?}", raw))?;
    Ok(Duration::from_secs(secs))
}

/**
 * \brief Listener settings for the HTTP server.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /** \brief Listen address, e.g. "127.0.0.1:3000" */
    pub addr: String,
    /** \brief Built single-page app to serve as fallback, if any. */
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("RELAY_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            static_dir: std::env::var("RELAY_STATIC_DIR").ok().map(PathBuf::from),
        }
    }
}

/**
 * \brief Where the upstream secret comes from. Consulted once per request.
 */
pub trait CredentialSource: Send + Sync {
    fn load(&self) -> Option<Credential>;
}

/**
 * \brief Reads the named environment variable at request time; blank counts as absent.
 */
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn load(&self) -> Option<Credential> {
        std::env::var(&self.var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Credential::new)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<Credential>);

impl StaticCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Some(Credential::new(secret)))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn load(&self) -> Option<Credential> {
        self.0.clone()
    }
}
