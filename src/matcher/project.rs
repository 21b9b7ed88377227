use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Maps a project id to its project number.
pub trait ProjectNumberResolver {
    fn project_number(&self, project_id: &str) -> Result<String>;
}

/// Treats every project id as its own number; used when state and
/// recommendations already agree on the project form.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityProjectNumbers;

impl ProjectNumberResolver for IdentityProjectNumbers {
    fn project_number(&self, project_id: &str) -> Result<String> {
        Ok(project_id.to_string())
    }
}

/// Fixed id-to-number table, typically exported once per organization.
/// Unknown ids resolve to themselves.
#[derive(Debug, Default, Clone)]
pub struct StaticProjectNumbers {
    numbers: BTreeMap<String, String>,
}

impl StaticProjectNumbers {
    pub fn new(numbers: BTreeMap<String, String>) -> Self {
        Self { numbers }
    }

    /// Load a JSON object of `{"project-id": "123"}` (numbers may be unquoted).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read project numbers {}", path.display()))?;
        let raw: BTreeMap<String, Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse project numbers JSON {}", path.display()))?;
        let mut numbers = BTreeMap::new();
        for (project_id, value) in raw {
            let number = match value {
                Value::String(number) => number,
                Value::Number(number) => number.to_string(),
                other => {
                    return Err(anyhow!(
                        "project number for {project_id} must be a string or number (got {other})"
                    ))
                }
            };
            numbers.insert(project_id, number);
        }
        Ok(Self::new(numbers))
    }
}

impl ProjectNumberResolver for StaticProjectNumbers {
    fn project_number(&self, project_id: &str) -> Result<String> {
        Ok(self
            .numbers
            .get(project_id)
            .cloned()
            .unwrap_or_else(|| project_id.to_string()))
    }
}

/// Per-run memo in front of a [`ProjectNumberResolver`].
///
/// Each distinct project id is resolved at most once per cache.
pub struct ProjectNumberCache<'r> {
    resolver: &'r dyn ProjectNumberResolver,
    memo: HashMap<String, String>,
}

impl<'r> ProjectNumberCache<'r> {
    pub fn new(resolver: &'r dyn ProjectNumberResolver) -> Self {
        Self {
            resolver,
            memo: HashMap::new(),
        }
    }

    /// Normalize `projects/<x>` or `<x>` to a project number.
    pub fn normalize(&mut self, project: &str) -> Result<String> {
        let project_id = project.strip_prefix("projects/").unwrap_or(project);
        if !project_id.is_empty() && project_id.bytes().all(|byte| byte.is_ascii_digit()) {
            return Ok(project_id.to_string());
        }
        if let Some(number) = self.memo.get(project_id) {
            return Ok(number.clone());
        }
        let number = self
            .resolver
            .project_number(project_id)
            .with_context(|| format!("resolve project number for {project_id}"))?;
        self.memo.insert(project_id.to_string(), number.clone());
        Ok(number)
    }
}
