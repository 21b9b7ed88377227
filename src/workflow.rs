//! Command handlers: load inputs, run the engine, emit JSON.
use crate::cli::{ApplyIamArgs, ApplyVmArgs, ConfigArgs, ManifestArgs, MatchArgs, RecommendationKind};
use crate::config::{config_stub, load_config};
use crate::matcher::{
    match_iam_resources, match_vm_resources, IdentityProjectNumbers, ProjectNumberCache,
    ProjectNumberResolver, StaticProjectNumbers,
};
use crate::patch::{apply_iam_edits, apply_vm_edits, ApplyOptions};
use crate::recommendation::{load_recommendations, IamRecommendation, VmRecommendation};
use crate::state::load_state;
use crate::util::emit_json;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn run_vm(args: ApplyVmArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let state = load_state(&args.input.state)?;
    let recommendations: Vec<VmRecommendation> =
        load_recommendations(&args.input.recommendations)?;
    let matched = match_vm_resources(&state, &recommendations, &config);
    tracing::info!(
        recommendations = recommendations.len(),
        matched = matched.len(),
        "matched vm recommendations against state"
    );
    let report = apply_vm_edits(
        &args.manifest.manifests,
        &matched,
        &config,
        &apply_options(&args.manifest),
    )?;
    emit_json(&report, args.input.out.as_deref())
}

pub fn run_iam(args: ApplyIamArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let state = load_state(&args.input.state)?;
    let recommendations: Vec<IamRecommendation> =
        load_recommendations(&args.input.recommendations)?;
    let resolver = project_resolver(args.project_numbers.as_deref())?;
    let mut projects = ProjectNumberCache::new(resolver.as_ref());
    let matched = match_iam_resources(&state, &recommendations, &config, &mut projects)?;
    tracing::info!(
        recommendations = recommendations.len(),
        matched = matched.len(),
        "matched iam recommendations against state"
    );
    let report = apply_iam_edits(
        &args.manifest.manifests,
        &matched,
        &config,
        &apply_options(&args.manifest),
    )?;
    emit_json(&report, args.input.out.as_deref())
}

pub fn run_match(args: MatchArgs) -> Result<()> {
    let config = load_config(args.input.config.as_deref())?;
    let state = load_state(&args.input.state)?;
    match args.kind {
        RecommendationKind::Vm => {
            let recommendations: Vec<VmRecommendation> =
                load_recommendations(&args.input.recommendations)?;
            let matched = match_vm_resources(&state, &recommendations, &config);
            emit_json(&matched, args.input.out.as_deref())
        }
        RecommendationKind::Iam => {
            let recommendations: Vec<IamRecommendation> =
                load_recommendations(&args.input.recommendations)?;
            let resolver = project_resolver(args.project_numbers.as_deref())?;
            let mut projects = ProjectNumberCache::new(resolver.as_ref());
            let matched = match_iam_resources(&state, &recommendations, &config, &mut projects)?;
            emit_json(&matched, args.input.out.as_deref())
        }
    }
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    let stub = config_stub()?;
    match args.out {
        Some(path) => {
            fs::write(&path, format!("{stub}\n"))
                .with_context(|| format!("write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{stub}"),
    }
    Ok(())
}

fn apply_options(args: &ManifestArgs) -> ApplyOptions {
    ApplyOptions {
        write_dir: args.write_dir.clone(),
        dry_run: args.dry_run,
    }
}

fn project_resolver(path: Option<&Path>) -> Result<Box<dyn ProjectNumberResolver>> {
    Ok(match path {
        Some(path) => Box::new(StaticProjectNumbers::load(path)?),
        None => Box::new(IdentityProjectNumbers),
    })
}
