//! Validate-forward-respond core of the chat relay, independent of the HTTP layer.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::{
    config::RelayConfig,
    error::RelayError,
    llm,
    models::{ChatMessage, CompletionPayload, Credential, Role},
    telemetry,
};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 1000);

const MESSAGES_REQUIRED: &str = "Messages array is required";
const MESSAGES_EMPTY: &str = "Messages array must not be empty";
const BODY_NOT_JSON: &str = "Request body must be valid JSON";

/**
 * \brief Successful relay outcome: the upstream JSON text, byte for byte.
 */
#[derive(Debug, Clone)]
pub struct RelayReply {
    pub body: String,
}

pub struct Relay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = llm::build_http_client(config.timeout).context("build upstream client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /**
     * \brief Runs one relay request from the credential check onward.
     * Exactly one upstream call is made, and only after the body validated.
     */
    pub async fn handle(
        &self,
        credential: Option<Credential>,
        body: &[u8],
    ) -> Result<RelayReply, RelayError> {
        let credential = credential.ok_or_else(|| {
            telemetry::log_error(
                "relay.config",
                &format!("{} not found in environment", self.config.credential_env),
            );
            RelayError::MissingCredential
        })?;

        let payload = self.prepare(body)?;

        let reply = llm::chat_completion(
            &self.client,
            &self.config.upstream_url,
            &credential,
            &payload,
        )
        .await
        .map_err(RelayError::from_transport)?;

        if !reply.status.is_success() {
            telemetry::log_error(
                "relay.upstream",
                &format!(
                    "status={} status_text={} error={}",
                    reply.status.as_u16(),
                    reply.status.canonical_reason().unwrap_or("unknown"),
                    reply.body
                ),
            );
            return Err(RelayError::from_upstream_status(reply.status));
        }

        let data: Value =
            serde_json::from_str(&reply.body).context("upstream returned a non-JSON body")?;
        if !llm::has_choices(&data) {
            telemetry::log_error(
                "relay.upstream",
                &format!("invalid response: {}", reply.body),
            );
            return Err(RelayError::InvalidAiResponse);
        }

        let total_tokens = llm::total_tokens(&data);
        telemetry::log_event(
            "relay.chat",
            &format!(
                "model={} tokens_used={} at={}",
                payload.model,
                total_tokens
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                telemetry::timestamp()
            ),
        );

        Ok(RelayReply { body: reply.body })
    }

    /**
     * \brief Parses and validates the inbound body and derives the upstream payload.
     */
    pub fn prepare(&self, body: &[u8]) -> Result<CompletionPayload, RelayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::InvalidRequest(MESSAGES_REQUIRED));
        }
        let body: Value =
            serde_json::from_slice(body).map_err(|_| RelayError::InvalidRequest(BODY_NOT_JSON))?;

        let messages = parse_messages(&body)?;
        Ok(CompletionPayload {
            model: derive_model(body.get("model"), &self.config.default_model),
            messages,
            temperature: derive_temperature(body.get("temperature")),
            max_tokens: derive_max_tokens(body.get("max_tokens")),
            stream: false,
        })
    }
}

fn parse_messages(body: &Value) -> Result<Vec<ChatMessage>, RelayError> {
    let items = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(RelayError::InvalidRequest(MESSAGES_REQUIRED))?;
    if items.is_empty() {
        return Err(RelayError::InvalidRequest(MESSAGES_EMPTY));
    }
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_message(item).ok_or(RelayError::InvalidMessage(idx)))
        .collect()
}

fn parse_message(item: &Value) -> Option<ChatMessage> {
    let role = Role::parse(item.get("role")?.as_str()?)?;
    let content = item.get("content")?.as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(ChatMessage::new(role, content))
}

/** \brief Blank or non-string ids fall back; anything else is forwarded as given. */
fn derive_model(raw: Option<&Value>, default_model: &str) -> String {
    raw.and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(default_model)
        .to_string()
}

/** \brief Out-of-range values are clamped, never rejected. */
pub fn derive_temperature(raw: Option<&Value>) -> f64 {
    let (lo, hi) = TEMPERATURE_RANGE;
    raw.and_then(Value::as_f64)
        .unwrap_or(DEFAULT_TEMPERATURE)
        .clamp(lo, hi)
}

pub fn derive_max_tokens(raw: Option<&Value>) -> u32 {
    let (lo, hi) = MAX_TOKENS_RANGE;
    raw.and_then(Value::as_f64)
        .map(|v| v.clamp(f64::from(lo), f64::from(hi)) as u32)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}
