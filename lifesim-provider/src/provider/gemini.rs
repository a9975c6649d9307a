//! Google Gemini provider implementation (Generative Language API)

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(Error::config_invalid("gemini provider requires an API key")
                .with_operation("gemini::new"));
        }
        let client = http_client(config.timeout_secs.unwrap_or(120))?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
    }
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gemini-1.5-pro-002")
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let api_request = GeminiRequest::from_completion(&request);

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        debug!(model = %model, prompt_chars = request.prompt_chars(), "Gemini generateContent request");

        let mut req = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url(), model))
            .header("x-goog-api-key", api_key)
            .json(&api_request);

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await.map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry = retry_after(&response);
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text, retry));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        api_response.into_completion(model)
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

impl GeminiRequest {
    fn from_completion(request: &CompletionRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: Some(match m.role {
                    Role::Assistant => "model".into(),
                    Role::User | Role::System => "user".into(),
                }),
                parts: vec![GeminiPart { text: Some(m.content.clone()) }],
            })
            .collect();

        let system_instruction = request.system_prompt().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: Some(text.to_string()) }],
        });

        Self {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                top_p: request.top_p,
                response_mime_type: match request.response_format {
                    ResponseFormat::Text => None,
                    ResponseFormat::Json => Some("application/json".into()),
                },
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
}

impl GeminiResponse {
    fn into_completion(
        self,
        requested_model: &str,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        // Only the first candidate's first part counts, as a plain text reply
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No candidates in response".into()))?;

        let content = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text));

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };

        let usage = self
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: self.response_id.unwrap_or_default(),
            model: self.model_version.unwrap_or_else(|| requested_model.to_string()),
            content,
            finish_reason,
            usage,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_generation_options() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("You are a helpful assistant"),
            ChatMessage::user("What did they do this week?"),
        ])
        .with_temperature(0.3)
        .with_top_p(0.95)
        .with_max_tokens(512)
        .with_response_format(ResponseFormat::Json);

        let value = serde_json::to_value(GeminiRequest::from_completion(&request)).unwrap();

        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "You are a helpful assistant");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value["systemInstruction"].get("role").is_none());
        assert!(value["generationConfig"].get("stopSequences").is_none());
    }

    #[test]
    fn test_response_takes_first_candidate_text() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "I sleep 7 hours now." }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 40, "candidatesTokenCount": 6, "totalTokenCount": 46 },
            "modelVersion": "gemini-1.5-pro-002"
        });

        let parsed: GeminiResponse = serde_json::from_value(body).unwrap();
        let completion = parsed.into_completion("gemini-1.5-pro-002").unwrap();

        assert_eq!(completion.content.as_deref(), Some("I sleep 7 hours now."));
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.total_tokens, 46);
    }

    #[test]
    fn test_response_without_candidates_is_an_error() {
        let parsed: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.into_completion("gemini-1.5-pro-002").is_err());
    }
}
