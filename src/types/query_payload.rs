use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Provider;

/// Correlates an in-flight request with the events that belong to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// The body of an outbound `chat_query` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    /// The user's question, trimmed.
    pub query: String,

    /// Provider that should answer.
    pub provider: Provider,

    /// Model identifier within the provider.
    pub model_id: String,

    /// Search the document index before answering.
    #[serde(rename = "use_rag")]
    pub use_retrieval: bool,

    /// Search the web before answering.
    pub use_web: bool,

    /// Correlation token, filled in by the controller when the query is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl QueryPayload {
    /// Tags the payload with a request id.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownProvider;
    use serde_json::{json, to_value};

    #[test]
    fn payload_uses_backend_field_names() {
        let payload = QueryPayload {
            query: "what is rust?".to_string(),
            provider: Provider::Known(KnownProvider::Groq),
            model_id: "llama-3.3-70b-versatile".to_string(),
            use_retrieval: true,
            use_web: false,
            request_id: None,
        }
        .with_request_id(RequestId(7));

        assert_eq!(
            to_value(&payload).unwrap(),
            json!({
                "query": "what is rust?",
                "provider": "groq",
                "model_id": "llama-3.3-70b-versatile",
                "use_rag": true,
                "use_web": false,
                "request_id": 7
            })
        );
    }

    #[test]
    fn untagged_payload_omits_request_id() {
        let payload = QueryPayload {
            query: "q".to_string(),
            provider: Provider::Custom("local".to_string()),
            model_id: "m".to_string(),
            use_retrieval: false,
            use_web: false,
            request_id: None,
        };
        let json = to_value(&payload).unwrap();
        assert!(json.get("request_id").is_none());
    }
}
