//! Maps a user intent onto an outbound query payload.

use crate::error::{Error, Result};
use crate::types::{Provider, QueryPayload, RetrievalMode};

/// Builds the payload for a `chat_query` event.
///
/// The query text is trimmed. Retrieval and web-search flags are derived
/// from `mode`.
///
/// # Errors
///
/// Returns a validation error when `user_text` is empty or whitespace-only,
/// or when no model is selected.
///
/// # Examples
///
/// ```
/// # use ragchat::{build_query, Provider, RetrievalMode};
/// let payload = build_query(
///     "  what changed?  ",
///     &Provider::from("groq"),
///     Some("llama-3.1-8b-instant"),
///     RetrievalMode::Retrieval,
/// )
/// .unwrap();
/// assert_eq!(payload.query, "what changed?");
/// assert!(payload.use_retrieval && !payload.use_web);
/// ```
pub fn build_query(
    user_text: &str,
    provider: &Provider,
    model_id: Option<&str>,
    mode: RetrievalMode,
) -> Result<QueryPayload> {
    let query = user_text.trim();
    if query.is_empty() {
        return Err(Error::validation(
            "query must not be empty",
            Some("query".to_string()),
        ));
    }
    let Some(model_id) = model_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Err(Error::validation(
            "no model selected",
            Some("model_id".to_string()),
        ));
    };
    Ok(QueryPayload {
        query: query.to_string(),
        provider: provider.clone(),
        model_id: model_id.to_string(),
        use_retrieval: mode.use_retrieval(),
        use_web: mode.use_web(),
        request_id: None,
    })
}
