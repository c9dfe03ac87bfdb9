//! Runtime configuration
//!
//! Loaded from JSON at startup. Every field has a default, so an empty
//! object `{}` is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::component::ComponentType;
use crate::error::{MirrorError, Result};

fn default_max_entities() -> usize {
    4096
}

fn default_vertex_pool_nodes() -> usize {
    65_536
}

fn default_shake_seed() -> u64 {
    0x5eed
}

/// Client runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Types registered for decoding but never instantiated on this client
    pub disabled_components: Vec<ComponentType>,

    /// Upper bound on simultaneously live entities
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,

    /// Global vertex pool size, in visual nodes
    #[serde(default = "default_vertex_pool_nodes")]
    pub vertex_pool_nodes: usize,

    /// Seed for the composition jitter RNG
    #[serde(default = "default_shake_seed")]
    pub shake_seed: u64,

    /// Reject a snapshot for an entity that is already live
    pub strict_snapshots: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            disabled_components: Vec::new(),
            max_entities: default_max_entities(),
            vertex_pool_nodes: default_vertex_pool_nodes(),
            shake_seed: default_shake_seed(),
            strict_snapshots: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entities == 0 {
            return Err(MirrorError::Config("max_entities must be positive".into()));
        }
        Ok(())
    }
}
