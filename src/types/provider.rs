use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies an upstream model provider.
///
/// This can be one of the providers the backend ships with or a custom key
/// for providers a particular deployment adds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Provider {
    /// Known provider keys
    Known(KnownProvider),

    /// Custom provider key
    Custom(String),
}

/// Providers the reference backend knows how to route to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum KnownProvider {
    /// OpenAI
    OpenAi,

    /// Groq
    Groq,

    /// Anthropic
    Anthropic,

    /// Mistral
    Mistral,

    /// Cohere
    Cohere,

    /// HuggingFace inference endpoints
    HuggingFace,

    /// xAI
    Xai,

    /// DeepSeek
    DeepSeek,

    /// Alibaba DashScope
    Alibaba,
}

impl KnownProvider {
    /// Every known provider, in the order the backend lists them.
    pub const ALL: [KnownProvider; 9] = [
        KnownProvider::OpenAi,
        KnownProvider::Groq,
        KnownProvider::Anthropic,
        KnownProvider::Mistral,
        KnownProvider::Cohere,
        KnownProvider::HuggingFace,
        KnownProvider::Xai,
        KnownProvider::DeepSeek,
        KnownProvider::Alibaba,
    ];

    /// The key used on the wire.
    pub fn key(self) -> &'static str {
        match self {
            KnownProvider::OpenAi => "openai",
            KnownProvider::Groq => "groq",
            KnownProvider::Anthropic => "anthropic",
            KnownProvider::Mistral => "mistral",
            KnownProvider::Cohere => "cohere",
            KnownProvider::HuggingFace => "huggingface",
            KnownProvider::Xai => "xai",
            KnownProvider::DeepSeek => "deepseek",
            KnownProvider::Alibaba => "alibaba",
        }
    }

    /// A human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            KnownProvider::OpenAi => "OpenAI",
            KnownProvider::Groq => "Groq",
            KnownProvider::Anthropic => "Anthropic",
            KnownProvider::Mistral => "Mistral",
            KnownProvider::Cohere => "Cohere",
            KnownProvider::HuggingFace => "HuggingFace",
            KnownProvider::Xai => "X AI",
            KnownProvider::DeepSeek => "DeepSeek",
            KnownProvider::Alibaba => "Alibaba",
        }
    }
}

impl Provider {
    /// The key used on the wire.
    pub fn key(&self) -> &str {
        match self {
            Provider::Known(known) => known.key(),
            Provider::Custom(custom) => custom,
        }
    }

    /// A human-readable name; custom providers display as their key.
    pub fn display_name(&self) -> &str {
        match self {
            Provider::Known(known) => known.display_name(),
            Provider::Custom(custom) => custom,
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Known(KnownProvider::Groq)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl fmt::Display for KnownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Ok(KnownProvider::ALL
            .iter()
            .copied()
            .find(|known| known.key() == lowered)
            .map(Provider::Known)
            .unwrap_or_else(|| Provider::Custom(s.trim().to_string())))
    }
}

impl From<KnownProvider> for Provider {
    fn from(provider: KnownProvider) -> Self {
        Provider::Known(provider)
    }
}

impl From<&str> for Provider {
    fn from(provider: &str) -> Self {
        match provider.parse() {
            Ok(provider) => provider,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_provider_serialization() {
        let provider = Provider::Known(KnownProvider::HuggingFace);
        let json = serde_json::to_string(&provider).unwrap();
        assert_eq!(json, r#""huggingface""#);
    }

    #[test]
    fn custom_provider_round_trips_through_json() {
        let provider: Provider = serde_json::from_str(r#""together""#).unwrap();
        assert_eq!(provider, Provider::Custom("together".to_string()));
        let provider: Provider = serde_json::from_str(r#""openai""#).unwrap();
        assert_eq!(provider, Provider::Known(KnownProvider::OpenAi));
    }

    #[test]
    fn parse_is_case_insensitive_for_known_keys() {
        assert_eq!(
            Provider::from("DeepSeek"),
            Provider::Known(KnownProvider::DeepSeek)
        );
        assert_eq!(Provider::from(" xai "), Provider::Known(KnownProvider::Xai));
        assert_eq!(
            Provider::from("local"),
            Provider::Custom("local".to_string())
        );
    }

    #[test]
    fn display_names() {
        assert_eq!(Provider::from("xai").display_name(), "X AI");
        assert_eq!(Provider::from("local").display_name(), "local");
        assert_eq!(Provider::default().to_string(), "groq");
    }
}
