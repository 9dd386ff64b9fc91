use serde::{Deserialize, Serialize};

/// Information about a model a provider offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique model identifier within its provider.
    pub id: String,

    /// A human-readable name for the model.
    #[serde(alias = "display_name")]
    pub name: String,

    /// Short description of what the model is good at.
    #[serde(default)]
    pub description: String,
}

impl ModelInfo {
    /// Creates a catalog entry.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_info_deserialization() {
        let json = serde_json::json!({
            "id": "gpt-4o",
            "name": "GPT-4o",
            "description": "Optimized GPT-4 with improved performance"
        });
        let info: ModelInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info.id, "gpt-4o");
        assert_eq!(info.name, "GPT-4o");
    }

    #[test]
    fn description_is_optional() {
        let json = serde_json::json!({"id": "qwq", "display_name": "QwQ"});
        let info: ModelInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info, ModelInfo::new("qwq", "QwQ", ""));
    }
}
