use super::{Content, GenerateRequest, GenerateResponse, Generator, LlmError, Part, Role};
use crate::db::models::Citation;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// `generateContent` over the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let body = build_request(request);
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        tracing::debug!(
            model = %self.config.model,
            contents = body.contents.len(),
            search = !body.tools.is_empty(),
            "sending Gemini request"
        );

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let data: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        parse_response(data)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn build_request(request: &GenerateRequest) -> GeminiRequest {
    let contents = request.contents.iter().map(to_wire_content).collect();
    let tools = if request.search_grounding {
        vec![GeminiTool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };
    GeminiRequest { contents, tools }
}

fn to_wire_content(content: &Content) -> GeminiContent {
    let role = match content.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts = content
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => GeminiPart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => GeminiPart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            },
        })
        .collect();
    GeminiContent { role, parts }
}

fn parse_response(data: GeminiResponse) -> Result<GenerateResponse, LlmError> {
    let Some(candidate) = data.candidates.into_iter().next() else {
        let reason = data
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked ({r})"))
            .unwrap_or_else(|| "response contained no candidates".to_string());
        return Err(LlmError::Parse(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
        return Err(LlmError::Parse(format!(
            "response contained no text (finish reason: {reason})"
        )));
    }

    let grounding = candidate
        .grounding_metadata
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .map(|chunk| match chunk.web {
                    Some(web) => Citation {
                        uri: web.uri,
                        title: web.title,
                    },
                    None => Citation::default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GenerateResponse { text, grounding })
}

fn api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let msg = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(code) if !code.is_empty() => format!("{code}: {msg}"),
                _ => msg,
            })
        })
        .unwrap_or_else(|| body.to_string());
    LlmError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_maps_roles_parts_and_search_tool() {
        let request = GenerateRequest {
            contents: vec![
                Content {
                    role: Role::User,
                    parts: vec![
                        Part::Text("what is this?".into()),
                        Part::InlineData {
                            mime_type: "image/png".into(),
                            data: "aGVsbG8=".into(),
                        },
                    ],
                },
                Content {
                    role: Role::Model,
                    parts: vec![Part::Text("a cat".into())],
                },
            ],
            search_grounding: true,
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [
                        {"text": "what is this?"},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]},
                    {"role": "model", "parts": [{"text": "a cat"}]}
                ],
                "tools": [{"google_search": {}}]
            })
        );
    }

    #[test]
    fn request_without_search_omits_tools() {
        let request = GenerateRequest {
            contents: vec![Content::user_text("hi")],
            search_grounding: false,
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn response_text_and_grounding_are_flattened() {
        let data: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Water boils "}, {"text": "at 100C."}]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.org/boil", "title": "example.org"}},
                        {"web": {"uri": "https://example.com"}},
                        {}
                    ]
                }
            }]
        }))
        .unwrap();

        let response = parse_response(data).unwrap();
        assert_eq!(response.text, "Water boils at 100C.");
        assert_eq!(response.grounding.len(), 3);
        assert_eq!(response.grounding[0].title.as_deref(), Some("example.org"));
        assert_eq!(response.grounding[1].title, None);
        assert_eq!(response.grounding[2], Citation::default());
    }

    #[test]
    fn missing_grounding_means_no_citations() {
        let data: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        }))
        .unwrap();
        assert!(parse_response(data).unwrap().grounding.is_empty());
    }

    #[test]
    fn blocked_prompt_is_a_parse_error() {
        let data: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = parse_response(data).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn api_error_prefers_provider_message() {
        let err = api_error(
            400,
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(
            err.to_string(),
            "API error: 400 - INVALID_ARGUMENT: API key not valid."
        );

        let err = api_error(502, "bad gateway");
        assert_eq!(err.to_string(), "API error: 502 - bad gateway");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(GeminiConfig::new(""));
        let request = GenerateRequest {
            contents: vec![Content::user_text("hi")],
            search_grounding: false,
        };
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
