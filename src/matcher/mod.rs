//! Cross-reference of recommendations against the state snapshot.
//!
//! State is the only place that links a cloud resource id to the name of the
//! declaration that manages it. Both matchers are pure apart from the
//! injected project-number resolver.
use crate::config::EngineConfig;
use crate::recommendation::{IamRecommendation, MatchedIam, MatchedVm, VmRecommendation};
use crate::state::StateSnapshot;
use anyhow::Result;

mod project;

pub use project::{
    IdentityProjectNumbers, ProjectNumberCache, ProjectNumberResolver, StaticProjectNumbers,
};

/// Attach the managing declaration name to each VM recommendation.
///
/// Recommendations whose instance is not in state are dropped. When state
/// lists the same instance twice the first declaration wins.
pub fn match_vm_resources(
    state: &StateSnapshot,
    recommendations: &[VmRecommendation],
    config: &EngineConfig,
) -> Vec<MatchedVm> {
    let mut matched = Vec::new();
    for rec in recommendations {
        let target = rec
            .instance_id
            .strip_prefix(config.instance_link_prefix.as_str())
            .unwrap_or(&rec.instance_id);
        let declaration = state
            .resources_of_type(&config.compute_instance_type)
            .find(|resource| {
                resource
                    .instances
                    .iter()
                    .any(|instance| instance.string_attribute("id") == Some(target))
            });
        match declaration {
            Some(resource) => matched.push(MatchedVm {
                recommendation: rec.clone(),
                tf_resource_name: resource.name.clone(),
            }),
            None => tracing::debug!(
                recommendation = %rec.recommendation_id,
                instance = target,
                "no state instance for recommendation"
            ),
        }
    }
    matched
}

/// Attach the managing binding declaration to each IAM recommendation.
///
/// A binding matches when its project (after number normalization), role and
/// member list all agree with the recommendation.
pub fn match_iam_resources(
    state: &StateSnapshot,
    recommendations: &[IamRecommendation],
    config: &EngineConfig,
    projects: &mut ProjectNumberCache<'_>,
) -> Result<Vec<MatchedIam>> {
    let mut matched = Vec::new();
    for rec in recommendations {
        let rec_project = projects.normalize(&rec.project)?;
        let mut found = None;
        'search: for resource in state.resources_of_type(&config.iam_binding_type) {
            for instance in &resource.instances {
                let Some(state_project) = instance.scalar_attribute("project") else {
                    continue;
                };
                if instance.string_attribute("role") != Some(rec.role.as_str()) {
                    continue;
                }
                if !instance
                    .string_list_attribute("members")
                    .contains(&rec.member.as_str())
                {
                    continue;
                }
                if projects.normalize(&state_project)? != rec_project {
                    continue;
                }
                found = Some(MatchedIam {
                    recommendation: rec.clone(),
                    resource_name: resource.name.clone(),
                    state_project,
                });
                break 'search;
            }
        }
        match found {
            Some(entry) => matched.push(entry),
            None => tracing::debug!(
                recommendation = %rec.recommendation_id,
                role = %rec.role,
                member = %rec.member,
                "no state binding for recommendation"
            ),
        }
    }
    Ok(matched)
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
