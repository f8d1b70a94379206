//! A read-only snapshot of model capabilities, supplied by the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// 0 when unknown.
    #[serde(default)]
    pub input_token_limit: u64,
    /// 0 when unknown.
    #[serde(default)]
    pub output_token_limit: u64,
    /// Whether the model accepts a thinking configuration.
    #[serde(default)]
    pub thinking: bool,
}

/// Models by ID. Lookups ignore a leading `models/` so either spelling of an ID works.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "Vec<ModelInfo>", into = "Vec<ModelInfo>")]
pub struct ModelCatalog {
    models: HashMap<String, ModelInfo>,
}

fn bare_id(id: &str) -> &str {
    id.strip_prefix("models/").unwrap_or(id)
}

impl ModelCatalog {
    pub fn new(models: impl IntoIterator<Item = ModelInfo>) -> Self {
        models.into_iter().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.models.get(bare_id(id))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }
}

impl FromIterator<ModelInfo> for ModelCatalog {
    fn from_iter<I: IntoIterator<Item = ModelInfo>>(iter: I) -> Self {
        ModelCatalog {
            models: iter
                .into_iter()
                .map(|m| (bare_id(&m.id).to_string(), m))
                .collect(),
        }
    }
}

impl From<Vec<ModelInfo>> for ModelCatalog {
    fn from(models: Vec<ModelInfo>) -> Self {
        models.into_iter().collect()
    }
}

impl From<ModelCatalog> for Vec<ModelInfo> {
    fn from(catalog: ModelCatalog) -> Self {
        let mut models: Vec<_> = catalog.models.into_values().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_ignores_models_prefix() {
        let catalog = ModelCatalog::new([ModelInfo {
            id: "models/gemini-2.5-flash".into(),
            output_token_limit: 65536,
            thinking: true,
            ..Default::default()
        }]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("gemini-2.5-flash").unwrap().thinking);
        assert!(catalog.get("models/gemini-2.5-flash").is_some());
        assert!(catalog.get("gemini-2.0-flash").is_none());
    }

    #[test]
    fn test_snapshot_from_json() {
        let catalog: ModelCatalog = serde_json::from_value(json!([
            {"id": "a", "output_token_limit": 10},
            {"id": "b", "display_name": "B", "thinking": true}
        ]))
        .unwrap();
        assert_eq!(catalog.get("a").unwrap().output_token_limit, 10);
        assert_eq!(catalog.get("b").unwrap().display_name, "B");

        let back = serde_json::to_value(&catalog).unwrap();
        assert_eq!(back[0]["id"], "a");
        assert_eq!(back[1]["id"], "b");
    }
}
