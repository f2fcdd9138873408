//! LLM Client — the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: No other module may call a generation provider
//! directly. All LLM interactions MUST go through this module.
//!
//! Exactly one provider (Anthropic, OpenAI, or Gemini) is selected at
//! startup via configuration; the wire shapes differ per provider but all
//! of them satisfy the same submit-and-extract-text contract, so the parse
//! and retry logic below is provider-agnostic.
//!
//! Failure policy: transport/timeout/status errors fail immediately with
//! no retry. A reply that cannot be parsed as JSON gets exactly ONE
//! corrective retry; if that also fails to parse (or the call itself
//! fails), the outcome is a failure. A missing credential is a normal
//! outcome, not an error — callers handle it by falling back.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderKind;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

const MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// What one `generate` call produced. `parsed` is `None` on every failure
/// path — absent credential, transport error, or unparseable output even
/// after the retry — with the reason in `error_detail`.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub provider_name: &'static str,
    pub parsed: Option<serde_json::Value>,
    pub latency_ms: u64,
    pub retried: bool,
    pub tokens_used: Option<u32>,
    pub error_detail: Option<String>,
}

/// Raw text reply plus usage, normalized across providers.
struct RawReply {
    text: String,
    tokens_used: Option<u32>,
}

/// The single LLM client used by the whole process. Constructed once at
/// startup and injected, never held as module-level state.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    provider: ProviderKind,
    api_key: Option<String>,
    /// Overrides the provider's hardcoded endpoint; used by wire tests.
    base_url: Option<String>,
}

impl LlmClient {
    pub fn new(provider: ProviderKind, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            provider,
            api_key,
            base_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self.provider {
            ProviderKind::Anthropic => ANTHROPIC_MODEL,
            ProviderKind::OpenAi => OPENAI_MODEL,
            ProviderKind::Gemini => GEMINI_MODEL,
        }
    }

    /// Submits `prompt` under `system` and returns a parsed JSON object,
    /// retrying exactly once on malformed output. Never more than two
    /// provider calls per invocation.
    pub async fn generate(&self, prompt: &str, system: &str) -> GenerationOutcome {
        let started = Instant::now();
        let provider_name = self.provider_name();

        let Some(api_key) = self.api_key.clone() else {
            return GenerationOutcome {
                provider_name,
                parsed: None,
                latency_ms: started.elapsed().as_millis() as u64,
                retried: false,
                tokens_used: None,
                error_detail: Some("no API key configured".to_string()),
            };
        };

        // Attempt 1
        let reply = match self.dispatch(&api_key, prompt, system).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("LLM call to {provider_name} failed: {e}");
                return self.failure(started, false, None, format!("provider call failed: {e}"));
            }
        };

        if let Some(parsed) = parse_lenient(&reply.text) {
            debug!("LLM reply parsed on first attempt ({provider_name})");
            return self.success(started, false, reply.tokens_used, parsed);
        }

        // Parse failure only: one corrective retry with the same provider
        // and system message.
        warn!("LLM reply from {provider_name} was not valid JSON — retrying once");
        let retry_prompt = format!("{prompt}{}", prompts::RETRY_CORRECTION);

        match self.dispatch(&api_key, &retry_prompt, system).await {
            Ok(retry_reply) => match parse_lenient(&retry_reply.text) {
                Some(parsed) => {
                    debug!("LLM retry parsed successfully ({provider_name})");
                    self.success(started, true, retry_reply.tokens_used, parsed)
                }
                None => self.failure(
                    started,
                    true,
                    retry_reply.tokens_used,
                    "reply was not valid JSON after one retry".to_string(),
                ),
            },
            Err(e) => self.failure(started, true, None, format!("retry call failed: {e}")),
        }
    }

    fn success(
        &self,
        started: Instant,
        retried: bool,
        tokens_used: Option<u32>,
        parsed: serde_json::Value,
    ) -> GenerationOutcome {
        GenerationOutcome {
            provider_name: self.provider_name(),
            parsed: Some(parsed),
            latency_ms: started.elapsed().as_millis() as u64,
            retried,
            tokens_used,
            error_detail: None,
        }
    }

    fn failure(
        &self,
        started: Instant,
        retried: bool,
        tokens_used: Option<u32>,
        detail: String,
    ) -> GenerationOutcome {
        GenerationOutcome {
            provider_name: self.provider_name(),
            parsed: None,
            latency_ms: started.elapsed().as_millis() as u64,
            retried,
            tokens_used,
            error_detail: Some(detail),
        }
    }

    /// One wire call to the configured provider. Each arm owns its request
    /// body, auth scheme, and text extraction; all return the same shape.
    async fn dispatch(
        &self,
        api_key: &str,
        prompt: &str,
        system: &str,
    ) -> Result<RawReply, LlmError> {
        match self.provider {
            ProviderKind::Anthropic => self.call_anthropic(api_key, prompt, system).await,
            ProviderKind::OpenAi => self.call_openai(api_key, prompt, system).await,
            ProviderKind::Gemini => self.call_gemini(api_key, prompt, system).await,
        }
    }

    fn endpoint(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(base), ProviderKind::Anthropic) => format!("{base}/v1/messages"),
            (None, ProviderKind::Anthropic) => ANTHROPIC_API_URL.to_string(),
            (Some(base), ProviderKind::OpenAi) => format!("{base}/v1/chat/completions"),
            (None, ProviderKind::OpenAi) => OPENAI_API_URL.to_string(),
            (base, ProviderKind::Gemini) => format!(
                "{}/v1beta/models/{GEMINI_MODEL}:generateContent",
                base.as_deref().unwrap_or(GEMINI_API_BASE)
            ),
        }
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        prompt: &str,
        system: &str,
    ) -> Result<RawReply, LlmError> {
        let body = AnthropicRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: AnthropicResponse = response.json().await?;

        let text = parsed
            .content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.clone())
            .ok_or(LlmError::EmptyContent)?;

        Ok(RawReply {
            text,
            tokens_used: parsed.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }

    async fn call_openai(
        &self,
        api_key: &str,
        prompt: &str,
        system: &str,
    ) -> Result<RawReply, LlmError> {
        let body = OpenAiRequest {
            model: OPENAI_MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: OpenAiResponse = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok(RawReply {
            text,
            tokens_used: parsed.usage.map(|u| u.total_tokens),
        })
    }

    async fn call_gemini(
        &self,
        api_key: &str,
        prompt: &str,
        system: &str,
    ) -> Result<RawReply, LlmError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: MAX_TOKENS,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: GeminiResponse = response.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok(RawReply {
            text,
            tokens_used: parsed.usage_metadata.map(|u| u.total_token_count),
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient JSON extraction
// ────────────────────────────────────────────────────────────────────────────

/// Two-stage lenient parse of model output.
///
/// Stage 1 parses the whole (fence-stripped) text. Stage 2 scans for the
/// first balanced `{...}` span and parses that substring, tolerating prose
/// around the object. Models wrap JSON in commentary often enough that
/// rejecting outright would waste the retry budget on trivially
/// recoverable replies.
fn parse_lenient(text: &str) -> Option<serde_json::Value> {
    let stripped = strip_json_fences(text);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stripped) {
        if value.is_object() {
            return Some(value);
        }
    }

    let span = first_balanced_object(stripped)?;
    serde_json::from_str::<serde_json::Value>(span).ok()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Returns the first balanced `{...}` span, tracking string literals and
/// escapes so braces inside strings do not count.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

// ────────────────────────────────────────────────────────────────────────────
// Cache-key derivation
// ────────────────────────────────────────────────────────────────────────────

/// Derives the cache fingerprint for a comparison request.
///
/// The score collection is serialized in caller order as `name:score` pairs
/// (one decimal place) and hashed first; that digest is then joined with
/// the normalized scalar inputs and hashed again. Score ORDER is part of
/// the identity: the same scores reordered produce a different fingerprint,
/// matching the prompt, which also embeds scores in caller order.
pub fn comparison_fingerprint<'a, I>(
    subject_a: &str,
    subject_b: &str,
    location: &str,
    timeline_years: u32,
    scores: I,
) -> String
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let canonical_scores = scores
        .into_iter()
        .map(|(name, score)| format!("{name}:{score:.1}"))
        .collect::<Vec<_>>()
        .join("|");
    let scores_digest = hex::encode(Sha256::digest(canonical_scores.as_bytes()));

    let composite = [
        scores_digest.as_str(),
        &subject_a.trim().to_lowercase(),
        &subject_b.trim().to_lowercase(),
        &location.trim().to_lowercase(),
        &timeline_years.to_string(),
    ]
    .join("\u{1f}");

    hex::encode(Sha256::digest(composite.as_bytes()))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_lenient_whole_object() {
        let parsed = parse_lenient("{\"a\": 1}").unwrap();
        assert_eq!(parsed["a"], 1);
    }

    #[test]
    fn test_parse_lenient_object_embedded_in_prose() {
        let text = "Sure! Here is your analysis:\n{\"a\": {\"b\": 2}}\nHope that helps.";
        let parsed = parse_lenient(text).unwrap();
        assert_eq!(parsed["a"]["b"], 2);
    }

    #[test]
    fn test_parse_lenient_braces_inside_strings() {
        let text = "note: {\"msg\": \"use {braces} carefully\", \"n\": 1} done";
        let parsed = parse_lenient(text).unwrap();
        assert_eq!(parsed["msg"], "use {braces} carefully");
    }

    #[test]
    fn test_parse_lenient_rejects_unbalanced() {
        assert!(parse_lenient("{\"a\": ").is_none());
        assert!(parse_lenient("no json here at all").is_none());
    }

    #[test]
    fn test_parse_lenient_rejects_bare_scalar() {
        // A parseable but non-object reply is not an acceptable result.
        assert!(parse_lenient("42").is_none());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let scores = [("SQL", 80.0), ("Python", 60.0)];
        let a = comparison_fingerprint("Data Scientist", "Product Manager", "Bangalore", 2, scores);
        let b = comparison_fingerprint("Data Scientist", "Product Manager", "Bangalore", 2, scores);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex sha-256
    }

    #[test]
    fn test_fingerprint_changes_with_any_scalar() {
        let scores = [("SQL", 80.0), ("Python", 60.0)];
        let base = comparison_fingerprint("A", "B", "Pune", 2, scores);
        assert_ne!(base, comparison_fingerprint("A2", "B", "Pune", 2, scores));
        assert_ne!(base, comparison_fingerprint("A", "B2", "Pune", 2, scores));
        assert_ne!(base, comparison_fingerprint("A", "B", "Delhi", 2, scores));
        assert_ne!(base, comparison_fingerprint("A", "B", "Pune", 3, scores));
    }

    #[test]
    fn test_fingerprint_changes_with_any_score() {
        let base = comparison_fingerprint("A", "B", "Pune", 2, [("SQL", 80.0), ("Go", 60.0)]);
        let bumped = comparison_fingerprint("A", "B", "Pune", 2, [("SQL", 80.5), ("Go", 60.0)]);
        let renamed = comparison_fingerprint("A", "B", "Pune", 2, [("SQL", 80.0), ("Rust", 60.0)]);
        assert_ne!(base, bumped);
        assert_ne!(base, renamed);
    }

    #[test]
    fn test_fingerprint_is_score_order_sensitive() {
        let ab = comparison_fingerprint("A", "B", "Pune", 2, [("SQL", 80.0), ("Go", 60.0)]);
        let ba = comparison_fingerprint("A", "B", "Pune", 2, [("Go", 60.0), ("SQL", 80.0)]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_fingerprint_normalizes_subject_case_and_whitespace() {
        let a = comparison_fingerprint("Data Scientist ", "B", "Pune", 2, []);
        let b = comparison_fingerprint("data scientist", "B", "Pune", 2, []);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_generate_without_key_is_not_configured_outcome() {
        let client = LlmClient::new(crate::config::ProviderKind::Anthropic, None, None);
        let outcome = client.generate("prompt", "system").await;
        assert!(outcome.parsed.is_none());
        assert!(!outcome.retried);
        assert_eq!(
            outcome.error_detail.as_deref(),
            Some("no API key configured")
        );
    }
}

#[cfg(test)]
mod wire_tests {
    //! Provider-wire behavior against a mock server: parse leniency,
    //! the retry-once bound, and the no-retry rule for transport errors.

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn anthropic_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 20}
        })
    }

    fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(
            crate::config::ProviderKind::Anthropic,
            Some("test-key".to_string()),
            Some(server.uri()),
        )
    }

    #[tokio::test]
    async fn test_valid_reply_parses_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(anthropic_reply(r#"{"summary": "ok"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.generate("prompt", "system").await;

        assert!(!outcome.retried);
        assert_eq!(outcome.parsed.unwrap()["summary"], "ok");
        assert_eq!(outcome.tokens_used, Some(30));
    }

    #[tokio::test]
    async fn test_malformed_then_valid_reply_sets_retried() {
        let server = MockServer::start().await;
        // First call: prose with no JSON. Second call: valid object.
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(anthropic_reply("I'm sorry, here is prose only.")),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(anthropic_reply(r#"{"fixed": true}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.generate("prompt", "system").await;

        assert!(outcome.retried);
        assert_eq!(outcome.parsed.unwrap()["fixed"], true);
        // Exactly two wire calls for the whole invocation.
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_twice_fails_after_exactly_two_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(anthropic_reply("still not json")),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.generate("prompt", "system").await;

        assert!(outcome.parsed.is_none());
        assert!(outcome.retried);
        assert!(outcome.error_detail.is_some());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.generate("prompt", "system").await;

        assert!(outcome.parsed.is_none());
        assert!(!outcome.retried);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_correction_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply("prose")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let _ = client.generate("the original prompt", "system").await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let retry_body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        let retry_content = retry_body["messages"][0]["content"].as_str().unwrap();
        assert!(retry_content.starts_with("the original prompt"));
        assert!(retry_content.contains("not valid JSON"));
        // System message is reused unchanged on the retry.
        assert_eq!(retry_body["system"], "system");
    }

    #[tokio::test]
    async fn test_openai_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"summary\": \"from openai\"}"}}],
                "usage": {"total_tokens": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(
            crate::config::ProviderKind::OpenAi,
            Some("test-key".to_string()),
            Some(server.uri()),
        );
        let outcome = client.generate("prompt", "system").await;

        assert_eq!(outcome.parsed.unwrap()["summary"], "from openai");
        assert_eq!(outcome.tokens_used, Some(42));
        assert_eq!(outcome.provider_name, "openai");
    }

    #[tokio::test]
    async fn test_gemini_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{GEMINI_MODEL}:generateContent")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": "{\"summary\": \"from gemini\"}"}]}}
                ],
                "usageMetadata": {"totalTokenCount": 17}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(
            crate::config::ProviderKind::Gemini,
            Some("test-key".to_string()),
            Some(server.uri()),
        );
        let outcome = client.generate("prompt", "system").await;

        assert_eq!(outcome.parsed.unwrap()["summary"], "from gemini");
        assert_eq!(outcome.tokens_used, Some(17));
    }
}
