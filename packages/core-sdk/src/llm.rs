use std::time::Duration;

use anyhow::Result;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde_json::Value;

use crate::models::{CompletionPayload, Credential};

/**
 * \brief Raw upstream answer: status plus unparsed body text.
 */
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: String,
}

/**
 * \brief HTTP client shared by all relay requests; `timeout` bounds each call.
 */
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/**
 * \brief Single non-streaming chat-completion call. Transport failures are
 * returned as-is so the caller can tell timeouts from connect errors.
 */
pub async fn chat_completion(
    client: &reqwest::Client,
    url: &str,
    credential: &Credential,
    payload: &CompletionPayload,
) -> Result<UpstreamReply, reqwest::Error> {
    let resp = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .bearer_auth(credential.expose())
        .json(payload)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;
    Ok(UpstreamReply { status, body })
}

pub fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn has_choices(v: &Value) -> bool {
    v.get("choices")
        .and_then(|c| c.as_array())
        .map(|arr| !arr.is_empty())
        .unwrap_or(false)
}

pub fn total_tokens(v: &Value) -> Option<u64> {
    v.get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_u64())
}
