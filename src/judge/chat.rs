//! OpenAI-compatible chat-completions judge (DeepSeek by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::SYSTEM_PROMPT;
use super::{Judge, QualityVerdict};
use crate::error::JudgeError;

/// Maximum allowed response body (256KB).
const MAX_RESPONSE_LEN: usize = 256 * 1_024;

#[derive(Debug, Clone)]
pub struct ChatJudge {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl ChatJudge {
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| JudgeError::Config("invalid API key format".to_string()))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| JudgeError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[async_trait]
impl Judge for ChatJudge {
    async fn evaluate(&self, prompt: &str) -> Result<QualityVerdict, JudgeError> {
        let request = ChatApiRequest {
            model: &self.model,
            messages: [
                ApiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ApiMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self.client.post(self.chat_url()).json(&request).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RESPONSE_LEN {
            return Err(JudgeError::Provider {
                status: status.as_u16(),
                message: format!("response too large: {} bytes", bytes.len()),
            });
        }
        let body = String::from_utf8_lossy(&bytes);
        let parsed = serde_json::from_str::<ChatApiResponse>(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(JudgeError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.ok_or_else(|| {
            JudgeError::InvalidVerdict("response is not a chat completion".to_string())
        })?;
        if let Some(error) = parsed.error {
            return Err(JudgeError::Provider {
                status: status.as_u16(),
                message: error.message.unwrap_or_default(),
            });
        }

        let content = parsed
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| JudgeError::InvalidVerdict("empty completion".to_string()))?;

        debug!(chars = content.len(), "judge replied");
        parse_verdict(&content)
    }
}

/// Extracts the verdict object from a completion, tolerating code fences or
/// prose around the JSON.
pub fn parse_verdict(content: &str) -> Result<QualityVerdict, JudgeError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(JudgeError::InvalidVerdict(
                "no JSON object in completion".to_string(),
            ))
        }
    };
    serde_json::from_str(json).map_err(|e| JudgeError::InvalidVerdict(e.to_string()))
}
