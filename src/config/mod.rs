//! Configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Paging limits applied by the list query builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Largest page a caller may request; larger requests are clamped
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_max_page_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
        }
    }
}

/// Policy strings for an entity, parsed with `str::parse::<AuthPolicy>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub read: Option<String>,

    #[serde(default)]
    pub write: Option<String>,
}

/// Per-entity overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Resource name (e.g., "orders")
    pub name: String,

    /// Overrides `paging.max_page_size` for this entity
    #[serde(default)]
    pub max_page_size: Option<usize>,

    #[serde(default)]
    pub policies: PolicyConfig,
}

/// Complete configuration of the service layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    #[serde(default)]
    pub paging: PagingConfig,

    /// Reject requests with 503 while migrations are pending
    #[serde(default = "default_true")]
    pub check_migrations: bool,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ScaffoldConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Find the section of an entity
    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Page-size ceiling for an entity, falling back to the global one
    pub fn max_page_size_for(&self, name: &str) -> usize {
        self.entity(name)
            .and_then(|entity| entity.max_page_size)
            .unwrap_or(self.paging.max_page_size)
    }

    /// Configuration with defaults and no entity overrides
    pub fn default_config() -> Self {
        Self {
            paging: PagingConfig::default(),
            check_migrations: true,
            entities: Vec::new(),
        }
    }
}
