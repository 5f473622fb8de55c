use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::{
    config::DEFAULT_MODEL,
    error::ErrorBody,
    fallback, llm,
    models::{ChatMessage, ChatRequest, Role},
    relay::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE},
    telemetry,
};

pub const GREETING: &str = "Halo! Saya adalah AI Adiwiyata. Saya siap membantu Anda dengan pertanyaan seputar lingkungan, program Adiwiyata, dan keberlanjutan. Ada yang ingin Anda tanyakan?";

/** \brief Shown when the relay answers but the first choice carries no text. */
pub const EMPTY_REPLY: &str = "Maaf, saya tidak dapat memproses permintaan Anda saat ini.";

pub const SYSTEM_PROMPT: &str = r#"Anda adalah AI Adiwiyata Assistant, asisten virtual yang ahli dalam bidang lingkungan hidup, program Adiwiyata, dan kebijakan Kementerian Lingkungan Hidup dan Kehutanan (KLHK) Indonesia.

IDENTITAS ANDA:
- Nama: AI Adiwiyata Assistant
- Spesialisasi: Program Adiwiyata, lingkungan hidup, dan kebijakan KLHK
- Bahasa: Indonesia (gunakan bahasa formal namun ramah)
- Karakter: Profesional, informatif, dan peduli lingkungan

PENGETAHUAN UTAMA:
1. Program Adiwiyata: sejarah dan tujuan, kriteria sekolah Adiwiyata, proses sertifikasi dan pembinaan, tingkatan (Sekolah Adiwiyata, Adiwiyata Mandiri, Adiwiyata Nasional), peran serta masyarakat.
2. Kementerian LHK: struktur organisasi, program utama bidang lingkungan, peraturan dan kebijakan lingkungan hidup, sistem perizinan lingkungan, program konservasi dan restorasi.
3. Lingkungan Hidup: pengelolaan sampah dan daur ulang, konservasi air dan energi, pencegahan pencemaran, keanekaragaman hayati Indonesia, perubahan iklim dan mitigasinya, pembangunan berkelanjutan.

BATASAN TOPIK:
- HANYA menjawab pertanyaan seputar lingkungan hidup, program Adiwiyata, dan KLHK
- TIDAK membahas topik di luar bidang lingkungan
- Jika ditanya hal di luar topik, arahkan kembali ke fokus lingkungan

GAYA KOMUNIKASI:
- Gunakan emoji yang relevan (🌱🌍♻️🏫📋)
- Berikan contoh konkret dan praktis
- Sertakan referensi peraturan jika diperlukan
- Tawarkan solusi yang dapat diterapkan
- Akhiri dengan pertanyaan untuk melanjutkan diskusi

Selalu prioritaskan informasi yang akurat dan terkini seputar lingkungan hidup dan program Adiwiyata."#;

/**
 * \brief Client-side transcript, oldest first, opened by the assistant greeting.
 */
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /** \brief Back to the greeting only. */
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /**
     * \brief What gets sent to the relay: the system prompt, then user and
     * assistant turns in order.
     */
    pub fn api_messages(&self) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(SYSTEM_PROMPT))
            .chain(
                self.messages
                    .iter()
                    .filter(|m| matches!(m.role, Role::User | Role::Assistant))
                    .cloned(),
            )
            .collect()
    }
}

/**
 * \brief One answered turn. `fallback` marks a canned reply.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub reply: String,
    pub fallback: bool,
}

pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    /**
     * \param endpoint Full relay URL, e.g. "http://127.0.0.1:3000/api/groq-chat"
     */
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: llm::build_http_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }

    /**
     * \brief Single relay call. A non-2xx answer becomes an error carrying the relay's label.
     */
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            messages,
            model: Some(DEFAULT_MODEL.to_string()),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        };
        let resp = self.http.post(&self.endpoint).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let label = resp
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("HTTP error! status: {}", status.as_u16()));
            return Err(anyhow!(label));
        }

        let v: Value = resp.json().await?;
        let content = llm::extract_openai_content(&v);
        if content.is_empty() {
            Ok(EMPTY_REPLY.to_string())
        } else {
            Ok(content)
        }
    }

    /**
     * \brief Appends the user turn, asks the relay, and appends the answer.
     * Any relay failure is replaced by a canned reply. Blank input is ignored.
     */
    pub async fn send_turn(&self, conversation: &mut Conversation, text: &str) -> Option<Turn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        conversation.push_user(text);

        let turn = match self.complete(conversation.api_messages()).await {
            Ok(reply) => Turn {
                reply,
                fallback: false,
            },
            Err(err) => {
                telemetry::log_error("client.chat", &format!("relay failed: {:#}", err));
                Turn {
                    reply: fallback::canned_reply(text).to_string(),
                    fallback: true,
                }
            }
        };
        conversation.push_assistant(turn.reply.clone());
        Some(turn)
    }
}
