use crate::server::RelayState;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json};
use hb_llm::LlmError;
use serde::Deserialize;
use std::sync::Arc;

const MISSING_TEXT: &str = "Error: 'text' is a required parameter.";

#[derive(Debug, Deserialize)]
struct InstructionRequest {
    #[serde(default)]
    text: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new().route("/ia", post(post_instruction))
}

/// Forward a chat message to the generation endpoint and answer with its raw text.
#[tracing::instrument(level = "info", skip_all)]
async fn post_instruction(
    Extension(state): Extension<Arc<RelayState>>,
    payload: Result<Json<InstructionRequest>, JsonRejection>,
) -> Response {
    let text = match payload {
        Ok(Json(req)) => req.text.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "instruction payload rejected");
            String::new()
        }
    };
    if text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, MISSING_TEXT).into_response();
    }

    tracing::info!(text_chars = text.chars().count(), "instruction request received");
    let prompt = format!("{}{}", state.prompt_prefix, text);
    match state.generation.generate(&prompt).await {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(e) => generation_failure(&e, state.generation.model()).into_response(),
    }
}

fn generation_failure(err: &LlmError, model: &str) -> (StatusCode, String) {
    tracing::error!(error = %err, "generation request failed");
    match err {
        LlmError::Unavailable(_) => (
            StatusCode::BAD_GATEWAY,
            format!(
                "Error: the generation service is unreachable. Check that it is running and the model '{model}' is available."
            ),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Error generating the instruction. Check that the generation service is running and the model '{model}' is available."
            ),
        ),
    }
}
