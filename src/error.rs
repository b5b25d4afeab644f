//! Agent-facing error types.

use thiserror::Error;

/// Errors from the LLM agent seam.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key in the environment. This aborts the run before any stage
    /// executes; it is never retried.
    #[error("Missing API key: MATHFORGE_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The request exceeded the per-call deadline. Handled by stages the
    /// same way as an extraction failure.
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("API returned error {code}: {message}")]
    ApiError { code: u16, message: String },

    #[error("API returned an empty response")]
    EmptyResponse,

    /// A scripted test agent ran out of responses.
    #[error("scripted agent exhausted after {0} responses")]
    ScriptExhausted(usize),
}

impl LlmError {
    /// Fatal errors abort the pipeline instead of entering the per-record
    /// fallback path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LlmError::MissingApiKey)
    }
}
