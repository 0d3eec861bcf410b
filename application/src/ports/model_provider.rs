//! Model provider port
//!
//! A provider turns compiled prompt text into generated text plus token
//! usage. Providers are collected into an explicit [`ProviderRegistry`]
//! built at the composition root.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not registered: {0}")]
    NotRegistered(String),

    #[error("No default provider configured")]
    NoDefault,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name, also used to pick the prompt dialect.
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError>;
}

/// Providers by name plus an optional default.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ModelProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the provider's own name. The first registration
    /// becomes the default unless one is set explicitly.
    pub fn register(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        let name = provider.name().to_string();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.providers.insert(name, provider);
        self
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))
    }

    /// The named provider, or the default when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        match name {
            Some(name) => self.get(name),
            None => {
                let default = self.default.as_deref().ok_or(ProviderError::NoDefault)?;
                self.get(default)
            }
        }
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl ModelProvider for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
            Ok(Generation {
                text: format!("{}:{}", self.0, request.prompt),
                usage: TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_registry_resolution() {
        let registry = ProviderRegistry::new()
            .register(Arc::new(Fixed("alpha")))
            .register(Arc::new(Fixed("beta")));

        assert_eq!(registry.default_name(), Some("alpha"));
        assert_eq!(registry.resolve(None).unwrap().name(), "alpha");
        assert_eq!(registry.resolve(Some("beta")).unwrap().name(), "beta");
        assert!(matches!(
            registry.resolve(Some("gamma")),
            Err(ProviderError::NotRegistered(_))
        ));

        let generation = registry
            .get("beta")
            .unwrap()
            .generate(GenerationRequest {
                prompt: "hi".to_string(),
                model: None,
                temperature: None,
                max_tokens: 10,
            })
            .await
            .unwrap();
        assert_eq!(generation.text, "beta:hi");
    }

    #[test]
    fn test_empty_registry_has_no_default() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.resolve(None), Err(ProviderError::NoDefault)));
        assert!(registry.is_empty());
    }
}
