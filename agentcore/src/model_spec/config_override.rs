//! Highest-priority resolver: the value the user pinned directly on `LLMConfig.contextLimit`.

use std::collections::HashMap;

use async_trait::async_trait;

use super::resolver::ModelLimitResolver;
use super::spec::ModelSpec;

/// Resolves from a fixed `provider/model -> ModelSpec` map supplied at construction,
/// typically built from a provider profile's explicit `contextLimit`/`maxTokens` fields.
///
/// Per the spec's open question on `contextLimit` (§9): this is authoritative and takes
/// priority over anything models.dev or a local file would say, so it belongs first in a
/// [`super::composite::CompositeResolver`] chain.
pub struct ConfigOverride {
    overrides: HashMap<String, ModelSpec>,
}

impl ConfigOverride {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, provider_id: impl Into<String>, model_id: impl Into<String>, spec: ModelSpec) -> Self {
        self.overrides.insert(key(&provider_id.into(), &model_id.into()), spec);
        self
    }
}

impl Default for ConfigOverride {
    fn default() -> Self {
        Self::new()
    }
}

fn key(provider_id: &str, model_id: &str) -> String {
    format!("{}/{}", provider_id, model_id)
}

#[async_trait]
impl ModelLimitResolver for ConfigOverride {
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec> {
        self.overrides.get(&key(provider_id, model_id)).cloned()
    }
}
