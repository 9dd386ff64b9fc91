//! Which models each provider offers.
//!
//! The catalog is read-only input to the controller. It decides the default
//! model when a provider is selected; a selected model the catalog does not
//! know stays usable.

use std::collections::BTreeMap;

use url::Url;

use crate::error::{Error, Result};
use crate::types::{KnownProvider, ModelInfo, Provider};

/// Path of the backend endpoint listing models per provider.
pub const MODELS_PATH: &str = "/api/chat/models";

/// Models grouped by provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    models: BTreeMap<Provider, Vec<ModelInfo>>,
}

impl ModelCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from a provider-to-models map.
    pub fn from_map(models: BTreeMap<Provider, Vec<ModelInfo>>) -> Self {
        Self { models }
    }

    /// The models the backend ships with.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for provider in KnownProvider::ALL {
            let models = builtin_models(provider)
                .iter()
                .map(|(id, name, description)| ModelInfo::new(*id, *name, *description))
                .collect();
            catalog.insert(Provider::Known(provider), models);
        }
        catalog
    }

    /// Replaces the model list of one provider.
    pub fn insert(&mut self, provider: Provider, models: Vec<ModelInfo>) {
        self.models.insert(provider, models);
    }

    /// Models offered by `provider`; empty when unknown.
    pub fn models(&self, provider: &Provider) -> &[ModelInfo] {
        self.models.get(provider).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first model listed for `provider`.
    pub fn default_model(&self, provider: &Provider) -> Option<&ModelInfo> {
        self.models(provider).first()
    }

    /// Looks up one model.
    pub fn find(&self, provider: &Provider, model_id: &str) -> Option<&ModelInfo> {
        self.models(provider).iter().find(|m| m.id == model_id)
    }

    /// Returns true if `provider` lists `model_id`.
    pub fn contains(&self, provider: &Provider, model_id: &str) -> bool {
        self.find(provider, model_id).is_some()
    }

    /// Providers with at least one model.
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.models
            .iter()
            .filter(|(_, models)| !models.is_empty())
            .map(|(provider, _)| provider)
    }

    /// Returns true if no provider lists any model.
    pub fn is_empty(&self) -> bool {
        self.providers().next().is_none()
    }
}

/// Builds the catalog endpoint for a backend base URL.
pub fn catalog_url(server: &Url) -> Result<Url> {
    Ok(server.join(MODELS_PATH)?)
}

/// Fetches the catalog from the backend.
///
/// # Errors
///
/// Returns an HTTP client error for transport failures or non-success
/// statuses, and a serialization error when the body is not a
/// provider-to-models map.
pub async fn fetch_catalog(client: &reqwest::Client, url: &Url) -> Result<ModelCatalog> {
    let response = client.get(url.clone()).send().await.map_err(|e| {
        if e.is_connect() {
            Error::connection(format!("catalog unreachable: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("catalog request failed: {e}"), Some(Box::new(e)))
        }
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::http_client(
            format!("catalog request returned {status}"),
            None,
        ));
    }
    let models = response
        .json::<BTreeMap<Provider, Vec<ModelInfo>>>()
        .await
        .map_err(|e| {
            Error::serialization(format!("failed to parse catalog: {e}"), Some(Box::new(e)))
        })?;
    tracing::debug!(providers = models.len(), %url, "catalog fetched");
    Ok(ModelCatalog::from_map(models))
}

/// Fetches the catalog, falling back to [`ModelCatalog::builtin`] on failure.
pub async fn fetch_catalog_or_builtin(client: &reqwest::Client, url: &Url) -> ModelCatalog {
    match fetch_catalog(client, url).await {
        Ok(catalog) if !catalog.is_empty() => catalog,
        Ok(_) => {
            tracing::warn!(%url, "catalog is empty; using builtin models");
            ModelCatalog::builtin()
        }
        Err(err) => {
            tracing::warn!(error = %err, %url, "failed to fetch catalog; using builtin models");
            ModelCatalog::builtin()
        }
    }
}

/// Model id, display name and description.
type ModelRow = (&'static str, &'static str, &'static str);

fn builtin_models(provider: KnownProvider) -> &'static [ModelRow] {
    match provider {
        KnownProvider::OpenAi => &[
            ("gpt-4o", "GPT-4o", "Optimized GPT-4 with improved performance"),
            ("gpt-4o-mini", "GPT-4o Mini", "Optimized for balance of capability and speed"),
            ("gpt-3.5-turbo", "GPT-3.5 Turbo", "Good balance of capability and speed"),
            ("gpt-4", "GPT-4", "Most capable model, better reasoning"),
        ],
        KnownProvider::Groq => &[
            (
                "llama-3.3-70b-versatile",
                "Llama 3.3 70B Versatile",
                "Latest Llama model optimized for Groq's platform",
            ),
            ("llama-3.1-8b-instant", "Llama 3.1 8B Instant", "Fast, smaller Llama model"),
            ("qwen-qwq-32b", "Qwen QwQ 32B", "Large Qwen model"),
            ("qwen-2.5-coder-32b", "Qwen 2.5 Coder 32B", "Specialized for programming tasks"),
            (
                "deepseek-r1-distill-qwen-32b",
                "DeepSeek R1 Qwen 32B",
                "Distilled model with reasoning capabilities",
            ),
            (
                "deepseek-r1-distill-llama-70b",
                "DeepSeek R1 Llama 70B",
                "Large distilled model with reasoning",
            ),
        ],
        KnownProvider::Anthropic => &[
            (
                "claude-3-5-haiku-latest",
                "Claude 3.5 Haiku",
                "Fastest Claude model for quick responses",
            ),
            (
                "claude-3-7-sonnet-latest",
                "Claude 3.7 Sonnet",
                "Balanced model with strong capabilities",
            ),
            ("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet", "Previous generation Sonnet model"),
            (
                "claude-3-opus-latest",
                "Claude 3 Opus",
                "Most capable Claude model with deepest reasoning",
            ),
        ],
        KnownProvider::Mistral => &[
            ("codestral-latest", "Codestral", "Latest code-optimized model from Mistral"),
            ("mistral-large-latest", "Mistral Large", "Largest and most capable Mistral model"),
            ("mistral-small-latest", "Mistral Small", "Smaller, faster Mistral model"),
            (
                "open-mistral-nemo",
                "Open Mistral NeMo",
                "Open edition of Mistral using NeMo framework",
            ),
        ],
        KnownProvider::Cohere => &[
            (
                "command-r-plus-08-2024",
                "Command R+ (08/2024)",
                "Latest R+ model with improved reasoning",
            ),
            ("command-r7b-12-2024", "Command R7B (12/2024)", "Latest 7B model, fast and efficient"),
            ("command-nightly", "Command Nightly", "Latest nightly build with newest features"),
        ],
        KnownProvider::HuggingFace => &[
            (
                "meta-llama/Llama-3.3-70B-Instruct",
                "Llama 3.3 70B",
                "Meta's largest Llama 3.3 model",
            ),
            (
                "deepseek-ai/DeepSeek-Coder-V2-Instruct",
                "DeepSeek Coder V2",
                "Programming-focused model",
            ),
            ("meta-llama/Llama-3.1-70B-Instruct", "Llama 3.1 70B", "Meta's Llama 3.1 model"),
            ("deepseek-ai/DeepSeek-V3", "DeepSeek V3", "General purpose model"),
            ("meta-llama/Llama-3.2-3B-Instruct", "Llama 3.2 3B", "Small, efficient Llama model"),
            (
                "perplexity-ai/r1-1776",
                "Perplexity R1",
                "Model focused on knowledge access and reasoning",
            ),
            ("deepseek-ai/DeepSeek-R1", "DeepSeek R1", "Reasoning-focused model"),
            ("Qwen/QwQ-32B", "QwQ 32B", "Alibaba's large reasoning model"),
            (
                "microsoft/Phi-4-multimodal-instruct",
                "Phi-4 Multimodal",
                "Microsoft's multimodal model",
            ),
        ],
        KnownProvider::Xai => &[
            ("grok-2-latest", "Grok 2", "Current Grok model for text conversations"),
            (
                "grok-2-vision-latest",
                "Grok 2 Vision",
                "Multimodal Grok model that can process images",
            ),
        ],
        KnownProvider::DeepSeek => &[
            ("deepseek-chat", "DeepSeek Chat", "General conversational model"),
            ("deepseek-reasoner", "DeepSeek Reasoner", "Enhanced reasoning capabilities"),
        ],
        KnownProvider::Alibaba => &[
            ("qwq-plus", "QwQ Plus", "Alibaba's DashScope QwQ Plus model"),
            ("qwq", "QwQ", "Alibaba's DashScope QwQ model"),
            ("qwen-vl-plus", "Qwen VL Plus", "Alibaba's multimodal model for vision and language"),
            (
                "qwen-vl-max",
                "Qwen VL Max",
                "Alibaba's larger multimodal model for vision and language",
            ),
        ],
    }
}
