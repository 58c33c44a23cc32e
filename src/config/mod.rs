//! Configuration loading and management

use serde::{Deserialize, Serialize};

use crate::core::error::{ConfigError, StrataError, StrataResult};
use crate::core::query::Ordering;
use crate::core::schema::EntitySchema;

/// Configuration for one served entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Entity kind (e.g., "customer")
    pub kind: String,

    /// Fixed list-response ordering, `"field"` or `"field:desc"` per entry
    #[serde(default)]
    pub ordering: Vec<String>,
}

impl ModelConfig {
    /// Resolve the configured ordering against a schema.
    ///
    /// Every ordered field must name a registered property; a typo here is
    /// a deployment mistake, not a request to tolerate.
    pub fn orderings(&self, schema: &EntitySchema) -> StrataResult<Vec<Ordering>> {
        self.ordering
            .iter()
            .map(|expr| {
                let ordering = Ordering::parse(expr);
                if schema.property(&ordering.property).is_none() {
                    return Err(StrataError::Config(ConfigError::UnknownProperty {
                        kind: schema.kind().to_string(),
                        property: ordering.property,
                    }));
                }
                Ok(ordering)
            })
            .collect()
    }
}

/// Complete configuration for the CRUD surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrudConfig {
    /// One entry per served kind
    pub models: Vec<ModelConfig>,
}

impl CrudConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> StrataResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Find the configuration entry for a kind
    pub fn model(&self, kind: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|model| model.kind == kind)
    }
}
