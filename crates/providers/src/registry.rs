//! Provider registry.
//!
//! Entries are kept in registration order. Keys are unique across the whole
//! registry, so a key resolves to at most one entry whatever capability is
//! asked for. Lookups are cheap clones of `Arc`s taken under a read lock.

use crate::capability::Capability;
use crate::entry::{ProviderEntry, ProviderType};
use crate::error::RegistryError;
use crate::loader::ProviderLoader;
use parking_lot::RwLock;
use shared::config::ProvidersConfig;
use shared::ContentKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<Vec<Arc<ProviderEntry>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Fails if its key is already taken.
    pub fn register(&self, entry: ProviderEntry) -> Result<Arc<ProviderEntry>, RegistryError> {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.iter().find(|e| e.key() == entry.key()) {
            warn!(
                key = entry.key(),
                existing = existing.provider_type().name(),
                rejected = entry.provider_type().name(),
                "Duplicate provider key"
            );
            return Err(RegistryError::DuplicateKey {
                key: entry.key().to_string(),
                existing: existing.provider_type().name(),
            });
        }

        debug!(
            key = entry.key(),
            capabilities = ?entry.capabilities(),
            "Registered provider"
        );

        let entry = Arc::new(entry);
        entries.push(Arc::clone(&entry));
        Ok(entry)
    }

    /// Every entry carrying `capability`, in registration order.
    pub fn get_all(&self, capability: Capability) -> Vec<Arc<ProviderEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.has(capability))
            .cloned()
            .collect()
    }

    /// Like [`get_all`](Self::get_all), restricted to one content kind.
    pub fn get_all_of_kind(
        &self,
        capability: Capability,
        kind: ContentKind,
    ) -> Vec<Arc<ProviderEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.has(capability) && e.kind() == kind)
            .cloned()
            .collect()
    }

    /// The entry with this key, if it carries `capability`.
    pub fn get_by_key(&self, capability: Capability, key: &str) -> Option<Arc<ProviderEntry>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.key() == key && e.has(capability))
            .cloned()
    }

    /// Distinct implementation types carrying `capability`, first-seen order.
    pub fn get_provider_types(&self, capability: Capability) -> Vec<ProviderType> {
        let mut types: Vec<ProviderType> = Vec::new();
        for entry in self.entries.read().iter().filter(|e| e.has(capability)) {
            let provider_type = entry.provider_type();
            if !types.contains(&provider_type) {
                types.push(provider_type);
            }
        }
        types
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|e| e.key().to_string())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().iter().any(|e| e.key() == key)
    }

    /// Register everything a loader produces, skipping keys switched off in
    /// `[providers] disabled`.
    ///
    /// A duplicate key fails the whole load; entries registered before it
    /// stay registered. Returns how many entries were added.
    pub fn load(
        &self,
        loader: &dyn ProviderLoader,
        config: &ProvidersConfig,
    ) -> Result<usize, RegistryError> {
        let entries = loader.load()?;
        let offered = entries.len();
        let mut added = 0;

        for entry in entries {
            if config.is_disabled(entry.key()) {
                debug!(key = entry.key(), "Skipping disabled provider");
                continue;
            }
            self.register(entry)?;
            added += 1;
        }

        info!(
            loader = loader.name(),
            offered,
            added,
            "Providers loaded"
        );

        Ok(added)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
