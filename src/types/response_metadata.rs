use serde::{Deserialize, Serialize};

/// Out-of-band information about a finished response.
///
/// Fields the backend does not report stay `None`; they are never filled
/// with zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Wall-clock generation time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,

    /// Tokens consumed by the prompt.
    #[serde(
        default,
        alias = "promptTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt_tokens: Option<u64>,

    /// Tokens generated in the completion.
    #[serde(
        default,
        alias = "completionTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub completion_tokens: Option<u64>,
}

impl ResponseMetadata {
    /// Create metadata carrying only the elapsed time.
    pub fn with_elapsed(elapsed: f64) -> Self {
        Self {
            elapsed: Some(elapsed),
            ..Self::default()
        }
    }

    /// Sum of prompt and completion tokens, when both are known and the sum
    /// fits in a `u64`.
    pub fn total_tokens(&self) -> Option<u64> {
        self.prompt_tokens?.checked_add(self.completion_tokens?)
    }

    /// Returns true when the backend reported nothing.
    pub fn is_empty(&self) -> bool {
        self.elapsed.is_none() && self.prompt_tokens.is_none() && self.completion_tokens.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json, to_value};

    #[test]
    fn absent_fields_stay_unset() {
        let meta: ResponseMetadata = from_value(json!({"elapsed": 1.2})).unwrap();
        assert_eq!(meta.elapsed, Some(1.2));
        assert_eq!(meta.prompt_tokens, None);
        assert_eq!(meta.completion_tokens, None);
        assert_eq!(meta.total_tokens(), None);
        assert_eq!(to_value(meta).unwrap(), json!({"elapsed": 1.2}));
    }

    #[test]
    fn camel_case_aliases() {
        let meta: ResponseMetadata =
            from_value(json!({"promptTokens": 10, "completionTokens": 32})).unwrap();
        assert_eq!(meta.total_tokens(), Some(42));
        assert!(!meta.is_empty());
        assert!(ResponseMetadata::default().is_empty());
    }

    #[test]
    fn total_tokens_does_not_overflow() {
        let meta: ResponseMetadata =
            from_value(json!({"prompt_tokens": u64::MAX, "completion_tokens": 1})).unwrap();
        assert_eq!(meta.prompt_tokens, Some(u64::MAX));
        assert_eq!(meta.total_tokens(), None);
    }
}
