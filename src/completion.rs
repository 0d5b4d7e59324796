//! Two-pass LLM completion adapter.
//!
//! Both passes are stateless chat-completion calls with a fixed system
//! instruction, temperature 0 and top_p 1. The first pass classifies the
//! candidate page; the second extracts the transaction table. Output must be
//! JSON; a parse failure is terminal for the request, with no retry.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::types::{FirstPass, TransactionRecord};

const FIRST_PASS_SYSTEM: &str = "\
You are parsing a municipal property-assessment page for a single property. \
Respond with JSON only, no prose and no code fences. Classify the page and \
answer with exactly one of these shapes:\n\
[1, [{\"sale_date\": \"...\", \"sale_price\": \"...\", \"buyer\": \"...\", \"seller\": \"...\"}, ...]]\n\
  when the page itself contains an ownership-history table; list every row.\n\
[2, {\"address\": \"...\", \"link\": \"...\"}]\n\
  when the page links to a record-detail page for the target address that must \
be fetched to see the history; use the full link URL.\n\
[3, {\"address\": \"...\", \"link\": \"...\"}]\n\
  when no page markup is available but the target address text is present; use \
the page URL given by the user as the link.\n\
[]\n\
  when none of the above applies.";

const SECOND_PASS_SYSTEM: &str = "\
You are parsing a municipal property-record page. Respond with JSON only, no \
prose and no code fences: a single array of the ownership-history rows, each \
{\"sale_date\": \"...\", \"sale_price\": \"...\", \"buyer\": \"...\", \
\"seller\": \"...\"}. Answer [] if the page lists no sales.";

/// Completion operations the pipeline depends on; trait-shaped so tests can
/// drive the orchestration with canned outcomes.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Classify a candidate page for `address` (served at `url`).
    async fn first_pass(
        &self,
        content: &str,
        address: &str,
        url: &str,
    ) -> Result<FirstPass, PipelineError>;

    /// Extract the transaction rows from followed-up content.
    async fn second_pass(
        &self,
        content: &str,
    ) -> Result<Vec<TransactionRecord>, PipelineError>;
}

/// OpenAI-style chat-completions client.
pub struct ChatCompletionClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            top_p: 1.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::CompletionFailed(e.into()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::CompletionFailed(e.into()))?;
        if !status.is_success() {
            return Err(PipelineError::CompletionFailed(anyhow!(
                "Completion API request failed: {} {}",
                status,
                body
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| PipelineError::CompletionFailed(anyhow!("{}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::CompletionFailed(anyhow!("Completion had no choices")))
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionClient {
    async fn first_pass(
        &self,
        content: &str,
        address: &str,
        url: &str,
    ) -> Result<FirstPass, PipelineError> {
        let user = format!(
            "Target address: {}\nPage URL: {}\n\nPage content:\n{}",
            address, url, content
        );
        let text = self.complete(FIRST_PASS_SYSTEM, &user).await?;
        parse_first_pass(&text)
    }

    async fn second_pass(
        &self,
        content: &str,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        let user = format!("Page content:\n{}", content);
        let text = self.complete(SECOND_PASS_SYSTEM, &user).await?;
        parse_transactions(&text)
    }
}

/// Parse the tagged first-pass array into a `FirstPass`.
///
/// `[]` is Empty; `[1, [rows]]`, `[2, {address, link}]` and
/// `[3, {address, link}]` map to their variants; anything else that still
/// parses as JSON is an unrecognized shape.
pub fn parse_first_pass(text: &str) -> Result<FirstPass, PipelineError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::CompletionParse(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(PipelineError::CompletionParse(
            "completion output is not an array".to_string(),
        ));
    };

    if items.is_empty() {
        return Ok(FirstPass::Empty);
    }

    let Some(tag) = items[0].as_u64() else {
        return Err(PipelineError::UnknownResponseShape(format!(
            "first element is not a tag: {}",
            items[0]
        )));
    };
    let payload = items.get(1).cloned().unwrap_or(Value::Null);

    match tag {
        1 => {
            let rows: Vec<TransactionRecord> = serde_json::from_value(payload)
                .map_err(|e| PipelineError::CompletionParse(e.to_string()))?;
            Ok(FirstPass::InlineTransactions(rows))
        }
        2 | 3 => {
            let target: FollowTarget = serde_json::from_value(payload)
                .map_err(|e| PipelineError::CompletionParse(e.to_string()))?;
            if tag == 2 {
                Ok(FirstPass::FollowLink {
                    address: target.address,
                    link: target.link,
                })
            } else {
                Ok(FirstPass::FollowContent {
                    address: target.address,
                    link: target.link,
                })
            }
        }
        other => Err(PipelineError::UnknownResponseShape(format!(
            "unrecognized tag {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
struct FollowTarget {
    address: String,
    link: String,
}

/// Parse the second-pass output: a bare JSON array of transaction rows.
pub fn parse_transactions(text: &str) -> Result<Vec<TransactionRecord>, PipelineError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::CompletionParse(e.to_string()))?;
    if !value.is_array() {
        return Err(PipelineError::CompletionParse(
            "completion output is not an array".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| PipelineError::CompletionParse(e.to_string()))
}

/// Drop one outer ```json fence if present. Chat endpoints add these even
/// when told not to; the body must still parse on its own.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
