use crate::error::{LlmError, Result};
use crate::types::{GenerateRequest, GenerateResponse};
use std::time::Duration;

pub const DEFAULT_GENERATION_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "gemma3";
/// Local inference can be slow; this is the only outbound call with a deadline.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const LOG_PREVIEW_CHARS: usize = 50;

#[derive(Clone)]
pub struct GenerationClient {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl GenerationClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(LlmError::InvalidInput(
                "generation endpoint is required".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(LlmError::InvalidInput("model is required".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            endpoint: endpoint.trim().to_string(),
            model: model.trim().to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single non-streaming generation and return the raw reply text.
    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model))]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(LlmError::InvalidInput("prompt is empty".to_string()));
        }

        let req = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self.client.post(&self.endpoint).json(&req).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "generate status={status} body={body}"
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        tracing::debug!(
            preview = %preview(&parsed.response),
            eval_count = ?parsed.eval_count,
            "generation completed"
        );
        Ok(parsed.response)
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    if text.chars().count() > LOG_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_endpoint_and_model() {
        assert!(matches!(
            GenerationClient::new(" ", DEFAULT_MODEL, DEFAULT_GENERATION_TIMEOUT),
            Err(LlmError::InvalidInput(_))
        ));
        assert!(matches!(
            GenerationClient::new(DEFAULT_GENERATION_URL, "", DEFAULT_GENERATION_TIMEOUT),
            Err(LlmError::InvalidInput(_))
        ));
    }

    #[test]
    fn new_trims_endpoint_and_model() {
        let client = GenerationClient::new(
            " http://localhost:11434/api/generate ",
            " gemma3 ",
            DEFAULT_GENERATION_TIMEOUT,
        )
        .expect("client");
        assert_eq!(client.endpoint(), DEFAULT_GENERATION_URL);
        assert_eq!(client.model(), "gemma3");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "ç".repeat(80);
        let p = preview(&long);
        assert_eq!(p.chars().count(), LOG_PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn generate_rejects_blank_prompt_without_network() {
        let client = GenerationClient::new(
            "http://127.0.0.1:9/api/generate",
            DEFAULT_MODEL,
            DEFAULT_GENERATION_TIMEOUT,
        )
        .expect("client");
        assert!(matches!(
            client.generate("   ").await,
            Err(LlmError::InvalidInput(_))
        ));
    }
}
