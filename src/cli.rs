//! CLI argument parsing.
//!
//! The CLI only wires files into the engine: every policy decision lives in
//! the matcher and patch modules so they can be driven from other callers.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "tfrec",
    version,
    about = "Apply VM rightsizing and IAM recommendations to Terraform manifests",
    after_help = "Examples:\n  tfrec vm --manifests ./infra --state state.json --recommendations vm.json\n  tfrec iam --manifests ./infra --state state.json --recommendations iam.json --project-numbers numbers.json\n  tfrec match vm --state state.json --recommendations vm.json\n  tfrec config > tfrec.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log skipped recommendations and every edit to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Vm(ApplyVmArgs),
    Iam(ApplyIamArgs),
    Match(MatchArgs),
    Config(ConfigArgs),
}

/// Inputs shared by every command that reads state and recommendations.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Terraform state snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub state: PathBuf,

    /// Recommendation records (JSON array)
    #[arg(long, value_name = "FILE")]
    pub recommendations: PathBuf,

    /// Engine config (JSON); defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Manifest location and write behavior for patching commands.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Directory holding the manifest files (not searched recursively)
    #[arg(long, value_name = "DIR")]
    pub manifests: PathBuf,

    /// Write edited files here instead of back into --manifests
    #[arg(long, value_name = "DIR")]
    pub write_dir: Option<PathBuf>,

    /// Report claims and changed files without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Rewrite machine_type for VM rightsizing recommendations")]
pub struct ApplyVmArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub manifest: ManifestArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Remove members from IAM bindings per IAM recommendations")]
pub struct ApplyIamArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// JSON object mapping project ids to project numbers
    #[arg(long, value_name = "FILE")]
    pub project_numbers: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecommendationKind {
    Vm,
    Iam,
}

#[derive(Parser, Debug)]
#[command(about = "Match recommendations against state without touching manifests")]
pub struct MatchArgs {
    /// Recommendation shape to read
    #[arg(value_enum)]
    pub kind: RecommendationKind,

    #[command(flatten)]
    pub input: InputArgs,

    /// JSON object mapping project ids to project numbers (iam only)
    #[arg(long, value_name = "FILE")]
    pub project_numbers: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Print the default engine config")]
pub struct ConfigArgs {
    /// Write the config here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}
