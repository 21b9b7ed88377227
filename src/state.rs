//! Terraform state snapshot.
//!
//! Only the parts the matcher needs are typed; instance attributes stay as raw
//! JSON because their shape depends on the resource type.
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateResource {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub instances: Vec<StateInstance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateInstance {
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl StateResource {
    /// Data sources share the type namespace but are never declared as
    /// `resource` blocks.
    pub fn is_managed(&self) -> bool {
        self.mode.as_deref().unwrap_or("managed") == "managed"
    }
}

impl StateInstance {
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Render a scalar attribute as text; project ids may be stored as numbers.
    pub fn scalar_attribute(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn string_list_attribute(&self, key: &str) -> Vec<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl StateSnapshot {
    /// Managed resources of one type, in state order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a StateResource> + 'a {
        self.resources
            .iter()
            .filter(move |resource| resource.is_managed() && resource.resource_type == resource_type)
    }
}

pub fn load_state(path: &Path) -> Result<StateSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("read state {}", path.display()))?;
    let state: StateSnapshot = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse state JSON {}", path.display()))?;
    Ok(state)
}
