//! Resolver trait: looks up context/output token limits for a `(provider, model)` pair.

use async_trait::async_trait;

use super::spec::ModelSpec;

/// Resolves a model's token limits.
///
/// Implemented by [`super::models_dev::ModelsDevResolver`] (remote), [`super::local_file::LocalFileResolver`]
/// (offline/pinned), [`super::cached::CachedResolver`] (wraps either with an in-memory cache), and
/// [`super::composite::CompositeResolver`] (tries several in order). The agent loop consults whichever
/// resolver the host configures to fill `LLMConfig.contextLimit` when the user didn't pin one explicitly.
#[async_trait]
pub trait ModelLimitResolver: Send + Sync {
    /// Resolves the limits for `model_id` under `provider_id`, or `None` if unknown.
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec>;
}
