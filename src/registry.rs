//! Registry for configured harvesters.
//!
//! Constructs one [`Harvester`] per configured provider entry and lets
//! callers enable or disable them at runtime. Only OpenAlex has a real
//! client; any other configured name is rejected.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{HarvesterConfig, ProviderEntry, Settings};
use crate::harvest::Harvester;
use crate::providers::{OpenAlexProvider, Provider};

/// Errors raised while building or managing the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No provider client exists for this configured name
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The named harvester is not registered
    #[error("harvester not found: {0}")]
    NotFound(String),
}

/// Active and inactive harvesters, keyed by provider name.
#[derive(Debug)]
pub struct HarvesterRegistry {
    active: HashMap<String, Harvester>,
    inactive: HashMap<String, Harvester>,
    config: HarvesterConfig,
}

impl HarvesterRegistry {
    /// Build harvesters for every configured provider, partitioned by
    /// the entry's enabled flag.
    pub fn from_settings(settings: &Settings) -> Result<Self, RegistryError> {
        let mut registry = Self {
            active: HashMap::new(),
            inactive: HashMap::new(),
            config: settings.harvester.clone(),
        };

        for entry in &settings.providers {
            let harvester = registry.create(entry)?;
            info!(provider = %entry.name, enabled = entry.enabled, "registered harvester");
            if entry.enabled {
                registry.active.insert(entry.name.clone(), harvester);
            } else {
                registry.inactive.insert(entry.name.clone(), harvester);
            }
        }
        Ok(registry)
    }

    fn create(&self, entry: &ProviderEntry) -> Result<Harvester, RegistryError> {
        let provider: Arc<dyn Provider> = match entry.name.to_ascii_lowercase().as_str() {
            "openalex" => {
                let mut provider = OpenAlexProvider::new(&self.config);
                if let Some(api_url) = &entry.api_url {
                    provider = provider.with_base_url(api_url.clone());
                }
                Arc::new(provider)
            }
            other => return Err(RegistryError::UnknownProvider(other.to_string())),
        };
        Ok(Harvester::new(provider, self.config.clone()))
    }

    /// Move a harvester to the active set, constructing it fresh if it
    /// was never configured before.
    pub fn enable(&mut self, name: &str) -> Result<(), RegistryError> {
        if let Some(harvester) = self.inactive.remove(name) {
            self.active.insert(name.to_string(), harvester);
            return Ok(());
        }
        if self.active.contains_key(name) {
            return Ok(());
        }
        let entry = ProviderEntry {
            name: name.to_string(),
            enabled: true,
            api_url: None,
        };
        let harvester = self.create(&entry)?;
        self.active.insert(name.to_string(), harvester);
        Ok(())
    }

    /// Move a harvester out of the active set, keeping its state.
    pub fn disable(&mut self, name: &str) -> Result<(), RegistryError> {
        let harvester = self
            .active
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.inactive.insert(name.to_string(), harvester);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Harvester> {
        self.active.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Harvester> {
        self.active.get_mut(name)
    }

    /// Names of the currently active harvesters.
    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
