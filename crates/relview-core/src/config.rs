//! Process configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Eviction policy for the process-wide mapper cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "strategy")]
pub enum CacheStrategy {
    /// Keep every compiled mapper for the process lifetime.
    Unbounded,
    /// Keep at most `capacity` mappers, evicting the least recently used.
    Lru { capacity: usize },
}

impl Default for CacheStrategy {
    fn default() -> Self {
        CacheStrategy::Unbounded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelviewConfig {
    pub mapper_cache: CacheStrategy,

    /// Default for `Options::auto_struct` when building from config.
    pub auto_struct: bool,

    /// Default for `Options::auto_map` when building from config.
    pub auto_map: bool,
}

impl RelviewConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RELVIEW_MAPPER_CACHE`: `unbounded` or `lru`
    /// - `RELVIEW_MAPPER_CACHE_CAPACITY`: LRU capacity (default 1024)
    /// - `RELVIEW_AUTO_STRUCT`: `true`/`false`
    /// - `RELVIEW_AUTO_MAP`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        let capacity = std::env::var("RELVIEW_MAPPER_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1024);

        if let Ok(s) = std::env::var("RELVIEW_MAPPER_CACHE") {
            match s.trim().to_ascii_lowercase().as_str() {
                "lru" => cfg.mapper_cache = CacheStrategy::Lru { capacity },
                "unbounded" => cfg.mapper_cache = CacheStrategy::Unbounded,
                _ => {}
            }
        }

        if let Ok(s) = std::env::var("RELVIEW_AUTO_STRUCT") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.auto_struct = v;
            }
        }

        if let Ok(s) = std::env::var("RELVIEW_AUTO_MAP") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.auto_map = v;
            }
        }

        cfg
    }

    /// Parse a YAML document, e.g.
    ///
    /// ```yaml
    /// mapper_cache: { strategy: lru, capacity: 256 }
    /// auto_struct: true
    /// ```
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: RelviewConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if let CacheStrategy::Lru { capacity: 0 } = self.mapper_cache {
            return Err(Error::Config("lru mapper cache needs capacity > 0".into()));
        }
        Ok(())
    }
}
