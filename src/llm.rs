//! Generative fallback for postings the pattern cascade cannot parse. One
//! request per posting, zero temperature, a strict single-line JSON reply
//! contract, and defensive parsing of whatever comes back. Failures of any
//! kind degrade to "no result"; the fallback never aborts a batch.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::SalaryRange;
use crate::pipeline::normalize::{guess_period, plausible_hourly, round2, to_hourly, Period};

const API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const MODEL: &str = "llama-3.1-8b-instant";
const MAX_TOKENS: u32 = 50;
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_MS: u64 = 500;

/// Max characters of section text sent per request, to bound token spend.
pub const MAX_INPUT_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str = r#"Extract salary information.
Reply ONLY with JSON: {"min":number,"max":number,"period":"hourly"|"daily"|"weekly"|"monthly"|"yearly"|"term","currency":"CAD"|"USD"}
If no salary, reply {"min":null}.
Example: "$800-1300/week" -> {"min":800,"max":1300,"period":"weekly","currency":"CAD"}"#;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty completion")]
    EmptyContent,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Client for the chat-completions fallback service.
pub struct GroqClient {
    client: Client,
    api_key: String,
}

impl GroqClient {
    pub fn new(api_key: String) -> GroqClient {
        GroqClient {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
            api_key,
        }
    }

    pub fn from_env() -> Option<GroqClient> {
        std::env::var("GROQ_API_KEY").ok().map(GroqClient::new)
    }

    /// Ask the model for a salary in the given section text. Retries
    /// undecodable replies and transport errors with linear backoff, then
    /// gives up silently. A reply of `{"min":null}` ends the attempt loop
    /// immediately — the model saw the text and found nothing.
    pub async fn extract(&self, section: &str) -> Option<SalaryRange> {
        let prompt: String = section.chars().take(MAX_INPUT_CHARS).collect();

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_MS * attempt as u64)).await;
            }
            match self.call(&prompt).await {
                Ok(content) => match parse_reply(&content) {
                    Some(reply) => return normalize_reply(reply),
                    None => {
                        warn!("undecodable fallback reply (attempt {}): {:?}", attempt + 1, content);
                    }
                },
                Err(e) => {
                    warn!("fallback call failed (attempt {}): {}", attempt + 1, e);
                }
            }
        }
        None
    }

    async fn call(&self, text: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

/// The model's structured reply. `min: None` means the model (or the parse)
/// found no salary.
#[derive(Debug, PartialEq)]
pub struct LlmReply {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub period: Option<String>,
    pub currency: Option<String>,
}

/// Decode a raw completion. Strips markdown fences, takes the first balanced
/// `{...}` substring, and reads numbers leniently (numeric strings count).
/// Returns `None` only when no JSON object can be decoded at all.
pub fn parse_reply(raw: &str) -> Option<LlmReply> {
    let text = strip_fences(raw.trim());
    let json = first_object(text)?;
    let value: Value = serde_json::from_str(json).ok()?;
    let obj = value.as_object()?;
    Some(LlmReply {
        min: lenient_num(obj.get("min")),
        max: lenient_num(obj.get("max")),
        period: obj
            .get("period")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        currency: obj
            .get("currency")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    })
}

/// Validate and normalize a decoded reply into an hourly range, or reject it.
pub fn normalize_reply(reply: LlmReply) -> Option<SalaryRange> {
    let min_raw = reply.min?;
    if min_raw <= 0.0 {
        return None;
    }
    let max_raw = reply.max.filter(|m| *m > 0.0).unwrap_or(min_raw);

    let period = reply
        .period
        .as_deref()
        .and_then(Period::parse)
        .unwrap_or_else(|| guess_period(min_raw));

    // Band check on the rounded value, so a boundary amount that rounds to
    // exactly 5.00 is accepted.
    let min = round2(to_hourly(min_raw, period));
    let max = to_hourly(max_raw, period);
    if !plausible_hourly(min) {
        return None;
    }

    let provenance = format!("llm:{}", period.tag());
    let range = SalaryRange::hourly(min, max, &provenance);
    match reply.currency {
        Some(c) => Some(range.with_currency(&c)),
        None => Some(range),
    }
}

fn lenient_num(v: Option<&Value>) -> Option<f64> {
    v.and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

fn strip_fences(text: &str) -> &str {
    let body = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    body.trim_start()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or_else(|| body.trim())
}

/// First balanced `{...}` substring, so prose around the JSON is tolerated.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Tests ──
