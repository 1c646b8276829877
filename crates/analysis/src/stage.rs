//! The reusable prompt-analysis stage runner.
//!
//! Every stage follows the same pattern: build the instruction pair, invoke
//! the backend, pull the JSON payload out of the free-form response, and
//! parse it into the stage's typed result. The dominant failure-handling
//! contract of the whole pipeline lives here: a stage never propagates a
//! transport or parse failure upward. Any failure degrades to the stage's
//! empty-but-well-typed default so a partial opinion is always produced.

use markcounsel_backend_azure::LlmBackend;
use markcounsel_model::CompletionRequest;
use markcounsel_prompt::extract_json_block;
use serde::de::DeserializeOwned;

/// Run one typed analysis stage to completion.
///
/// Total: transport errors, non-success responses, missing JSON payloads,
/// and malformed JSON all log a warning and return `T::default()`.
pub async fn run_stage<T, B>(backend: &B, stage_name: &'static str, request: &CompletionRequest) -> T
where
    T: DeserializeOwned + Default,
    B: LlmBackend,
{
    let content = match backend.complete(request).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(stage = stage_name, error = %e, "Stage call failed; using empty default");
            return T::default();
        }
    };

    let Some(payload) = extract_json_block(&content) else {
        tracing::warn!(stage = stage_name, "No JSON payload in response; using empty default");
        return T::default();
    };

    match serde_json::from_str(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(stage = stage_name, error = %e, "Unparseable JSON payload; using empty default");
            T::default()
        }
    }
}

/// Run a plain-text stage (the reformat pass).
///
/// Total in the same way: any failure returns the caller-supplied fallback
/// text instead of an error.
pub async fn run_text_stage<B>(
    backend: &B,
    stage_name: &'static str,
    request: &CompletionRequest,
    fallback: String,
) -> String
where
    B: LlmBackend,
{
    match backend.complete(request).await {
        Ok(content) if !content.trim().is_empty() => content,
        Ok(_) => {
            tracing::warn!(stage = stage_name, "Empty response; keeping fallback text");
            fallback
        }
        Err(e) => {
            tracing::warn!(stage = stage_name, error = %e, "Stage call failed; keeping fallback text");
            fallback
        }
    }
}
