//! Composite resolver: tries a list of resolvers in order, first hit wins.

use async_trait::async_trait;

use super::resolver::ModelLimitResolver;
use super::spec::ModelSpec;

/// Tries each resolver in order and returns the first `Some`.
///
/// Typical stack: [`super::config_override::ConfigOverride`] (user pinned a value in
/// `LLMConfig`) first, then a [`super::cached::CachedResolver`] wrapping
/// [`super::models_dev::ModelsDevResolver`], then a [`super::local_file::LocalFileResolver`]
/// fallback for offline use.
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn ModelLimitResolver>>,
}

impl CompositeResolver {
    pub fn new(resolvers: Vec<Box<dyn ModelLimitResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl ModelLimitResolver for CompositeResolver {
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec> {
        for resolver in &self.resolvers {
            if let Some(spec) = resolver.resolve(provider_id, model_id).await {
                return Some(spec);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(ModelSpec);

    #[async_trait]
    impl ModelLimitResolver for Always {
        async fn resolve(&self, _provider_id: &str, _model_id: &str) -> Option<ModelSpec> {
            Some(self.0.clone())
        }
    }

    struct Never;

    #[async_trait]
    impl ModelLimitResolver for Never {
        async fn resolve(&self, _provider_id: &str, _model_id: &str) -> Option<ModelSpec> {
            None
        }
    }

    #[tokio::test]
    async fn first_matching_resolver_wins() {
        let composite = CompositeResolver::new(vec![
            Box::new(Never),
            Box::new(Always(ModelSpec::new(128_000, 8_192))),
        ]);
        let spec = composite.resolve("openai", "gpt-5").await.unwrap();
        assert_eq!(spec.context_limit, 128_000);
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let composite = CompositeResolver::new(vec![Box::new(Never)]);
        assert!(composite.resolve("openai", "gpt-5").await.is_none());
    }
}
