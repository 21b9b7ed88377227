use super::{ApplyOptions, Claims, PatchReport, Workspace};
use crate::config::EngineConfig;
use crate::locate::{find_attribute, find_declaration, line_range, offset_to_line};
use crate::manifest::scan::Scan;
use crate::recommendation::{ClaimedRecommendation, MatchedVm};
use crate::surgery::replace_line;
use anyhow::{anyhow, Result};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

const MACHINE_TYPE_KEY: &str = "machine_type";

fn line_assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([ \t]*machine_type[ \t]*=[ \t]*)").expect("machine_type line regex")
    })
}

fn inline_assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\bmachine_type[ \t]*=[ \t]*)("[^"\n]*"|[^\s}]+)"#)
            .expect("machine_type inline regex")
    })
}

/// Rewrite the `machine_type` of each matched instance declaration.
///
/// The first file declaring the instance with a `machine_type` assignment
/// gets the edit; instances declared nowhere are skipped without a claim.
/// An instance already at the recommended size is claimed but left untouched.
pub fn apply_vm_edits(
    manifest_dir: &Path,
    matched: &[MatchedVm],
    config: &EngineConfig,
    options: &ApplyOptions,
) -> Result<PatchReport> {
    let mut workspace = Workspace::load(manifest_dir, config)?;
    let mut claims = Claims::default();

    for entry in matched {
        if apply_one(&mut workspace, entry)? {
            claims.push(ClaimedRecommendation::from(&entry.recommendation));
        } else {
            tracing::debug!(
                resource = %entry.tf_resource_name,
                recommendation = %entry.recommendation.recommendation_id,
                "no machine_type declaration for instance"
            );
        }
    }

    let changed = workspace.write_changes(options)?;
    tracing::info!(
        matched = matched.len(),
        claimed = claims.entries.len(),
        changed_files = changed.len(),
        "vm edits applied"
    );
    Ok(claims.into_report(changed))
}

fn apply_one(workspace: &mut Workspace<'_>, entry: &MatchedVm) -> Result<bool> {
    let size = &entry.recommendation.size;
    let resolved = workspace.resolved();
    for (idx, view) in resolved.iter().enumerate() {
        let scan = Scan::new(&view.contents);
        let Some(decl) = find_declaration(
            &scan,
            &workspace.config.compute_instance_type,
            &entry.tf_resource_name,
        ) else {
            continue;
        };
        let Some(attr) = find_attribute(&scan, &decl, MACHINE_TYPE_KEY) else {
            continue;
        };
        let line = offset_to_line(&view.contents, attr.key_offset);
        if attr.literal_value(&view.contents) == Some(size.as_str()) {
            tracing::debug!(
                path = %view.path.display(),
                line,
                resource = %entry.tf_resource_name,
                "machine_type already at recommended size"
            );
            return Ok(true);
        }
        let file = &mut workspace.files[idx];
        let new_line = machine_type_line(&file.contents, line, size)?;
        file.contents = replace_line(&file.contents, line, &new_line)?;
        tracing::info!(
            path = %file.path.display(),
            line,
            resource = %entry.tf_resource_name,
            size = %size,
            "rewrote machine_type"
        );
        return Ok(true);
    }
    Ok(false)
}

/// New text for the original line holding the assignment.
fn machine_type_line(original: &str, line: usize, size: &str) -> Result<String> {
    let range = line_range(original, line)
        .ok_or_else(|| anyhow!("machine_type line {line} out of range"))?;
    let body = &original[range];
    if let Some(caps) = line_assignment_regex().captures(body) {
        return Ok(format!("{}\"{size}\"", &caps[1]));
    }
    Ok(inline_assignment_regex()
        .replace(body, |caps: &Captures<'_>| format!("{}\"{size}\"", &caps[1]))
        .into_owned())
}
