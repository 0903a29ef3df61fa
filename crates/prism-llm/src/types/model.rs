use serde::{Deserialize, Serialize};

/// A model available through the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as accepted by the completion endpoints
    pub id: String,
    /// Name of the provider that owns the model
    pub owned_by: String,
    /// Unix timestamp of model creation, when the provider reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
}

impl ModelDescriptor {
    /// Descriptor without a creation timestamp
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: owned_by.into(),
            created: None,
        }
    }
}
