use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Selects whether document search and web search augment the query.
///
/// Web search is only reachable together with document search; there is no
/// member that enables it on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalMode {
    /// Plain language-model query.
    #[default]
    #[serde(rename = "llm")]
    LlmOnly,

    /// Document retrieval feeding the language model.
    #[serde(rename = "rag_llm")]
    Retrieval,

    /// Document retrieval plus web search feeding the language model.
    #[serde(rename = "rag_llm_web")]
    RetrievalWithWeb,
}

impl RetrievalMode {
    /// Whether the backend should search the document index.
    pub fn use_retrieval(self) -> bool {
        matches!(
            self,
            RetrievalMode::Retrieval | RetrievalMode::RetrievalWithWeb
        )
    }

    /// Whether the backend should also search the web.
    pub fn use_web(self) -> bool {
        matches!(self, RetrievalMode::RetrievalWithWeb)
    }

    /// Short description used in status lines.
    pub fn describe(self) -> &'static str {
        match self {
            RetrievalMode::LlmOnly => "using LLM only",
            RetrievalMode::Retrieval => "with document search",
            RetrievalMode::RetrievalWithWeb => "with document search and web search",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::LlmOnly => write!(f, "llm"),
            RetrievalMode::Retrieval => write!(f, "rag"),
            RetrievalMode::RetrievalWithWeb => write!(f, "web"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm" | "1" => Ok(RetrievalMode::LlmOnly),
            "rag" | "rag_llm" | "2" => Ok(RetrievalMode::Retrieval),
            "web" | "rag_llm_web" | "3" => Ok(RetrievalMode::RetrievalWithWeb),
            other => Err(format!(
                "unknown mode '{other}' (expected llm, rag, or web)"
            )),
        }
    }
}
