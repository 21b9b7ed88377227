use super::{ApplyOptions, Claims, PatchReport, Workspace};
use crate::config::EngineConfig;
use crate::locate::{
    declarations, find_attribute, line_range, list_items, offset_to_line, Declaration, ListItem,
};
use crate::manifest::scan::Scan;
use crate::recommendation::{ClaimedRecommendation, MatchedIam};
use crate::surgery::{append_transformed_copy, comment_block, comment_line, comment_span};
use anyhow::{anyhow, Result};
use std::path::Path;

/// A binding declaration in the resolved view that holds the member.
struct BindingHit {
    file: usize,
    decl: Declaration,
    members: Vec<ListItem>,
    target: usize,
}

/// Remove each matched member from its binding declaration.
///
/// When other members remain only the member's entry is commented out. When
/// the member was the last one the whole block is commented out, and if the
/// recommendation re-grants the member under another role a copy of the block
/// with that role is appended after it.
pub fn apply_iam_edits(
    manifest_dir: &Path,
    matched: &[MatchedIam],
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
                resource = %entry.resource_name,
                role = %entry.recommendation.role,
                member = %entry.recommendation.member,
                "no binding declaration holds member"
            );
        }
    }

    let changed = workspace.write_changes(options)?;
    tracing::info!(
        matched = matched.len(),
        claimed = claims.entries.len(),
        changed_files = changed.len(),
        "iam edits applied"
    );
    Ok(claims.into_report(changed))
}

fn apply_one(workspace: &mut Workspace<'_>, entry: &MatchedIam) -> Result<bool> {
    let resolved = workspace.resolved();
    let Some(hit) = resolved.iter().enumerate().find_map(|(file, view)| {
        find_binding(&view.contents, &workspace.config.iam_binding_type, entry)
            .map(|(decl, members, target)| BindingHit {
                file,
                decl,
                members,
                target,
            })
    }) else {
        return Ok(false);
    };

    let view = &resolved[hit.file].contents;
    let rec = &entry.recommendation;
    let binding_type = &workspace.config.iam_binding_type;
    let file = &mut workspace.files[hit.file];
    let remaining = hit
        .members
        .iter()
        .filter(|item| item.value.as_deref() != Some(rec.member.as_str()))
        .count();

    if remaining > 0 {
        let Some(contents) = comment_member(view, &file.contents, binding_type, &hit)? else {
            tracing::debug!(
                path = %file.path.display(),
                resource = %entry.resource_name,
                member = %rec.member,
                "member entry does not map onto original list"
            );
            return Ok(false);
        };
        file.contents = contents;
        tracing::info!(
            path = %file.path.display(),
            resource = %entry.resource_name,
            member = %rec.member,
            remaining,
            "commented out binding member"
        );
        return Ok(true);
    }

    let start = hit.decl.start_line(view);
    let end = hit.decl.end_line(view);
    let mut contents = file.contents.clone();
    if let Some(add) = rec.add.as_deref() {
        match append_transformed_copy(&contents, start, end, add)? {
            Some(appended) => contents = appended,
            None => tracing::debug!(
                resource = %entry.resource_name,
                "binding has no literal role to rewrite; copy not appended"
            ),
        }
    }
    file.contents = comment_block(&contents, start, end)?;
    tracing::info!(
        path = %file.path.display(),
        start,
        end,
        resource = %entry.resource_name,
        moved_to = rec.add.as_deref().unwrap_or(""),
        "commented out binding"
    );
    Ok(true)
}

/// First declaration named like the match whose role, project and members
/// agree with the recommendation.
fn find_binding(
    text: &str,
    binding_type: &str,
    entry: &MatchedIam,
) -> Option<(Declaration, Vec<ListItem>, usize)> {
    let scan = Scan::new(text);
    let rec = &entry.recommendation;
    declarations(&scan, binding_type)
        .into_iter()
        .filter(|decl| decl.name == entry.resource_name)
        .find_map(|decl| {
            let role = find_attribute(&scan, &decl, "role")?;
            if role.literal_value(text) != Some(rec.role.as_str()) {
                return None;
            }
            if let Some(project) = find_attribute(&scan, &decl, "project") {
                let project = project.literal_value(text)?;
                if project != entry.state_project && project != rec.project {
                    return None;
                }
            }
            let members = list_items(&scan, &find_attribute(&scan, &decl, "members")?)?;
            let target = members
                .iter()
                .position(|item| item.value.as_deref() == Some(rec.member.as_str()))?;
            Some((decl, members, target))
        })
}

/// Comment out the targeted member entry in the original content.
///
/// The entry is mapped from the resolved view to the original by its index
/// among the list's top-level elements, since substitution changes element
/// text but never the element count. A member alone on its lines has those
/// lines wrapped; otherwise only the entry and its trailing comma are.
/// Returns `None` when the entry cannot be mapped or isolated.
fn comment_member(
    view: &str,
    original: &str,
    binding_type: &str,
    hit: &BindingHit,
) -> Result<Option<String>> {
    let scan = Scan::new(original);
    let start_line = hit.decl.start_line(view);
    let Some(decl) = declarations(&scan, binding_type)
        .into_iter()
        .find(|decl| decl.name == hit.decl.name && decl.start_line(original) == start_line)
    else {
        return Ok(None);
    };
    let Some(items) = find_attribute(&scan, &decl, "members")
        .and_then(|attr| list_items(&scan, &attr))
        .filter(|items| items.len() == hit.members.len())
    else {
        return Ok(None);
    };
    let entry = &items[hit.target].range;
    let first = offset_to_line(original, entry.start);
    let last = offset_to_line(original, entry.end - 1);
    let (Some(first_range), Some(last_range)) =
        (line_range(original, first), line_range(original, last))
    else {
        return Err(anyhow!("member entry lines {first}..{last} out of range"));
    };
    let tail = entry_tail(&original[entry.end..last_range.end]);
    let before = &original[first_range.start..entry.start];
    let after = original[entry.end + tail..last_range.end].trim();
    let alone = before.trim().is_empty()
        && (after.is_empty() || after.starts_with('#') || after.starts_with("//"));

    match (alone, first == last) {
        (true, true) => comment_line(original, first).map(Some),
        (true, false) => comment_block(original, first, last).map(Some),
        (false, true) => {
            let span = entry.start - first_range.start..entry.end + tail - first_range.start;
            comment_span(original, first, span).map(Some)
        }
        (false, false) => Ok(None),
    }
}

/// Length of the `,` (with leading blanks) that closes a list entry, if any.
fn entry_tail(rest: &str) -> usize {
    let trimmed = rest.trim_start_matches([' ', '\t']);
    if trimmed.starts_with(',') {
        rest.len() - trimmed.len() + 1
    } else {
        0
    }
}
