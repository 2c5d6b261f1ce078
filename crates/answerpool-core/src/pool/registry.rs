//! Provider registry.
//!
//! Owns the configured providers. Static fields (name, endpoint, keys,
//! models) are fixed at construction; `active` and `priority` are per-provider
//! atomics so administrative changes never block request dispatch and only
//! affect candidate lists built afterwards.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use secrecy::{ExposeSecret, SecretString};

use answerpool_types::config::ProviderConfig;
use answerpool_types::error::RegistryError;

/// One upstream provider and its API keys.
pub struct Provider {
    name: String,
    base_url: String,
    keys: Vec<SecretString>,
    default_model: String,
    models: Vec<String>,
    /// Position in configuration; breaks priority ties.
    order: usize,
    active: AtomicBool,
    priority: AtomicI32,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("keys", &format_args!("<{} redacted>", self.keys.len()))
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .field("active", &self.is_active())
            .field("priority", &self.priority())
            .finish()
    }
}

impl Provider {
    pub fn from_config(config: &ProviderConfig, order: usize) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keys: config
                .keys
                .iter()
                .map(|k| SecretString::from(k.clone()))
                .collect(),
            default_model: config.model.clone(),
            models: config.models.clone(),
            order,
            active: AtomicBool::new(config.active),
            priority: AtomicI32::new(config.priority),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn key(&self, index: usize) -> Option<&SecretString> {
        self.keys.get(index)
    }

    /// Display form of a key: first six and last four characters.
    pub fn masked_key(&self, index: usize) -> String {
        self.keys
            .get(index)
            .map(|k| mask_key(k.expose_secret()))
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }

    /// A provider supports a model listed in `models` or equal to its default.
    pub fn supports(&self, model: &str) -> bool {
        self.default_model == model || self.models.iter().any(|m| m == model)
    }

    /// Model to send upstream for a request preference, or `None` when the
    /// provider cannot serve it.
    pub fn resolve_model(&self, requested: Option<&str>) -> Option<String> {
        match requested {
            None => Some(self.default_model.clone()),
            Some(model) if self.supports(model) => Some(model.to_string()),
            Some(_) => None,
        }
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Point-in-time copy of a provider's registry state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSnapshot {
    pub name: String,
    pub base_url: String,
    pub active: bool,
    pub priority: i32,
    pub default_model: String,
    pub models: Vec<String>,
    pub key_count: usize,
    pub order: usize,
}

/// Registry of configured providers, in configuration order.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<Provider>>,
}

impl ProviderRegistry {
    /// Build the registry from validated provider configuration.
    pub fn from_configs(configs: &[ProviderConfig]) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(configs.len());
        for (order, config) in configs.iter().enumerate() {
            if !seen.insert(config.name.as_str()) {
                return Err(RegistryError::Duplicate(config.name.clone()));
            }
            providers.push(Arc::new(Provider::from_config(config, order)));
        }
        Ok(Self { providers })
    }

    /// All providers in configuration order.
    pub fn providers(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    /// Snapshots sorted by priority, ties by configuration order.
    pub fn list(&self) -> Vec<ProviderSnapshot> {
        let mut snapshots: Vec<ProviderSnapshot> = self
            .providers
            .iter()
            .map(|p| ProviderSnapshot {
                name: p.name.clone(),
                base_url: p.base_url.clone(),
                active: p.is_active(),
                priority: p.priority(),
                default_model: p.default_model.clone(),
                models: p.models.clone(),
                key_count: p.keys.len(),
                order: p.order,
            })
            .collect();
        snapshots.sort_by_key(|s| (s.priority, s.order));
        snapshots
    }

    pub fn get(&self, name: &str) -> Result<Arc<Provider>, RegistryError> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn set_active(&self, name: &str, active: bool) -> Result<(), RegistryError> {
        let provider = self.get(name)?;
        let previous = provider.active.swap(active, Ordering::AcqRel);
        if previous != active {
            tracing::info!(provider = %name, active, "Provider activation changed");
        }
        Ok(())
    }

    pub fn set_priority(&self, name: &str, priority: i32) -> Result<(), RegistryError> {
        let provider = self.get(name)?;
        let previous = provider.priority.swap(priority, Ordering::AcqRel);
        tracing::info!(provider = %name, previous, priority, "Provider priority changed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn provider_config(name: &str, priority: i32, keys: &[&str]) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            base_url: format!("https://{name}.example.com/"),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            model: "default-model".to_string(),
            models: vec!["alt-model".to_string()],
            active: true,
            priority,
        }
    }

    #[test]
    fn test_list_sorted_by_priority_then_order() {
        let registry = ProviderRegistry::from_configs(&[
            provider_config("c", 2, &["k"]),
            provider_config("a", 1, &["k"]),
            provider_config("b", 1, &["k"]),
        ])
        .unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ProviderRegistry::from_configs(&[
            provider_config("a", 1, &["k"]),
            provider_config("a", 2, &["k"]),
        ]);
        assert_eq!(result.unwrap_err(), RegistryError::Duplicate("a".to_string()));
    }

    #[test]
    fn test_set_active_and_priority() {
        let registry = ProviderRegistry::from_configs(&[
            provider_config("a", 1, &["k"]),
            provider_config("b", 2, &["k"]),
        ])
        .unwrap();

        registry.set_active("a", false).unwrap();
        registry.set_priority("b", 0).unwrap();

        let list = registry.list();
        assert_eq!(list[0].name, "b");
        assert_eq!(list[0].priority, 0);
        assert!(!list[1].active);
    }

    #[test]
    fn test_unknown_provider_is_not_found() {
        let registry = ProviderRegistry::from_configs(&[provider_config("a", 1, &["k"])]).unwrap();
        assert_eq!(
            registry.set_active("ghost", true).unwrap_err(),
            RegistryError::NotFound("ghost".to_string())
        );
        assert!(registry.get("ghost").is_err());
        assert!(registry.set_priority("ghost", 3).is_err());
    }

    #[test]
    fn test_model_resolution() {
        let provider = Provider::from_config(&provider_config("a", 1, &["k"]), 0);
        assert_eq!(provider.resolve_model(None).as_deref(), Some("default-model"));
        assert_eq!(
            provider.resolve_model(Some("alt-model")).as_deref(),
            Some("alt-model")
        );
        assert_eq!(
            provider.resolve_model(Some("default-model")).as_deref(),
            Some("default-model")
        );
        assert!(provider.resolve_model(Some("other")).is_none());
        assert_eq!(provider.base_url(), "https://a.example.com");
    }

    #[test]
    fn test_masked_key_hides_material() {
        let provider = Provider::from_config(
            &provider_config("a", 1, &["sk-abcdefghijklmnop1234", "short"]),
            0,
        );
        assert_eq!(provider.masked_key(0), "sk-abc...1234");
        assert_eq!(provider.masked_key(1), "****");
        assert!(!format!("{provider:?}").contains("abcdefgh"));
    }
}
