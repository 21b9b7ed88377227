//! Engine configuration.
//!
//! Every name the engine matches against (resource types, file extension,
//! self-link prefix) lives here so the patching code stays provider-agnostic.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current schema version for the engine config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_MANIFEST_EXTENSION: &str = "tf";
pub const DEFAULT_VARIABLES_FILE: &str = "terraform.tfvars";
pub const DEFAULT_COMPUTE_INSTANCE_TYPE: &str = "google_compute_instance";
pub const DEFAULT_IAM_BINDING_TYPE: &str = "google_project_iam_binding";
pub const DEFAULT_SERVICE_ACCOUNT_TYPE: &str = "google_service_account";
pub const DEFAULT_INSTANCE_LINK_PREFIX: &str = "//compute.googleapis.com/";

/// Names and conventions used while matching and patching manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub schema_version: u32,
    /// File extension (without the dot) that marks a manifest file.
    pub manifest_extension: String,
    /// Variable definitions file, relative to the manifest directory.
    pub variables_file: String,
    pub compute_instance_type: String,
    pub iam_binding_type: String,
    pub service_account_type: String,
    /// Prefix stripped from recommendation instance ids before comparing
    /// against state instance ids.
    pub instance_link_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn default_config() -> EngineConfig {
    EngineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        manifest_extension: DEFAULT_MANIFEST_EXTENSION.to_string(),
        variables_file: DEFAULT_VARIABLES_FILE.to_string(),
        compute_instance_type: DEFAULT_COMPUTE_INSTANCE_TYPE.to_string(),
        iam_binding_type: DEFAULT_IAM_BINDING_TYPE.to_string(),
        service_account_type: DEFAULT_SERVICE_ACCOUNT_TYPE.to_string(),
        instance_link_prefix: DEFAULT_INSTANCE_LINK_PREFIX.to_string(),
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// Load a config file, falling back to defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(default_config());
    };
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &EngineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.manifest_extension.starts_with('.') {
        return Err(anyhow!(
            "manifest_extension must not include the leading dot (got {:?})",
            config.manifest_extension
        ));
    }
    let required = [
        ("manifest_extension", &config.manifest_extension),
        ("variables_file", &config.variables_file),
        ("compute_instance_type", &config.compute_instance_type),
        ("iam_binding_type", &config.iam_binding_type),
        ("service_account_type", &config.service_account_type),
    ];
    for (label, value) in required {
        if value.trim().is_empty() {
            return Err(anyhow!("{label} must be non-empty"));
        }
    }
    let variables = Path::new(&config.variables_file);
    if variables.is_absolute()
        || variables
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        return Err(anyhow!(
            "variables_file must be a relative path without '..' (got {:?})",
            config.variables_file
        ));
    }
    Ok(())
}
