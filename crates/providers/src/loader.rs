//! Provider discovery.
//!
//! A loader produces ready-built entries; the registry decides which of them
//! get registered. Providers compiled into the binary are listed through a
//! [`StaticLoader`].

use crate::entry::ProviderEntry;
use crate::error::RegistryError;

pub trait ProviderLoader: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn load(&self) -> Result<Vec<ProviderEntry>, RegistryError>;
}

type Constructor = Box<dyn Fn() -> Result<ProviderEntry, RegistryError> + Send + Sync>;

/// Loader over a fixed list of constructors, run in the order added.
pub struct StaticLoader {
    name: String,
    constructors: Vec<Constructor>,
}

impl StaticLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    pub fn with<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> Result<ProviderEntry, RegistryError> + Send + Sync + 'static,
    {
        self.constructors.push(Box::new(constructor));
        self
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl ProviderLoader for StaticLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<ProviderEntry>, RegistryError> {
        self.constructors
            .iter()
            .map(|construct| {
                construct().map_err(|e| RegistryError::Load {
                    loader: self.name.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("name", &self.name)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}
