//! # World Configuration
//!
//! Construction parameters for a [`World`](crate::World), loaded once at
//! startup from TOML.
//!
//! ```toml
//! entity_capacity = 10000
//! component_capacity = 64
//! ```
//!
//! Missing keys fall back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::world::{DEFAULT_COMPONENT_CAPACITY, DEFAULT_ENTITY_CAPACITY};
use crate::error::{EcsError, EcsResult};

/// Capacities of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of entity ids available up front.
    pub entity_capacity: usize,
    /// Number of component types that can be registered.
    pub component_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: DEFAULT_ENTITY_CAPACITY as usize,
            component_capacity: DEFAULT_COMPONENT_CAPACITY,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|error| EcsError::InvalidConfig(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the file cannot be read or its
    /// content is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| {
            EcsError::InvalidConfig(format!("cannot read {}: {error}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "world config loaded");
        Ok(config)
    }

    /// Serializes to a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string_pretty(self).map_err(|error| EcsError::InvalidConfig(error.to_string()))
    }

    /// Checks that both capacities are usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if a capacity is zero or the
    /// entity capacity exceeds the entity id space.
    pub fn validate(&self) -> EcsResult<()> {
        if self.entity_capacity == 0 {
            return Err(EcsError::InvalidConfig(
                "entity_capacity must be greater than zero".to_owned(),
            ));
        }
        if u32::try_from(self.entity_capacity).is_err() {
            return Err(EcsError::InvalidConfig(format!(
                "entity_capacity {} exceeds u32::MAX",
                self.entity_capacity
            )));
        }
        if self.component_capacity == 0 {
            return Err(EcsError::InvalidConfig(
                "component_capacity must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorldConfig::default();
        assert_eq!(config.entity_capacity, 5000);
        assert_eq!(config.component_capacity, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = WorldConfig::from_toml_str("entity_capacity = 128").unwrap();
        assert_eq!(config.entity_capacity, 128);
        assert_eq!(config.component_capacity, 32);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            WorldConfig::from_toml_str("component_capacity = 0"),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(WorldConfig::from_toml_str("entity_capacity = \"many\"").is_err());
        assert!(WorldConfig::from_toml_file("/nonexistent/sigil.toml").is_err());
    }

    #[test]
    fn test_toml_file_round_trip() {
        let config = WorldConfig {
            entity_capacity: 64,
            component_capacity: 8,
        };
        let path = std::env::temp_dir().join(format!("sigil_world_{}.toml", std::process::id()));
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = WorldConfig::from_toml_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
