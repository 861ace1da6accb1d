//! Command-line interface for `taintrail`.
//!
//! Consumes an AST bundle produced by an external ingestion layer and
//! prints the analysis response as JSON. The exit code reflects whether
//! findings at or above the severity threshold were present, so the
//! binary can gate CI pipelines.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use taintrail::catalog::custom;
use taintrail::engine::{AnalysisRequest, AnalysisResponse, Engine, GraphCache, ModuleInput};
use taintrail::{CancelFlag, Severity, TierLimits};

/// Command line interface configuration using `clap`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "taintrail - cross-file taint-flow analysis over normalized ASTs",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze an AST bundle and print the response as JSON.
    Analyze {
        /// Path to the AST bundle (JSON).
        bundle: PathBuf,

        /// Tier preset to run under.
        #[arg(long, value_enum, default_value_t = Tier::Community)]
        tier: Tier,

        /// Requested propagation depth (clamped by the tier).
        #[arg(long)]
        depth: Option<u32>,

        /// Include raw taint flows in the output (requires an
        /// entitlement that grants flow export).
        #[arg(long)]
        flows: bool,

        /// Additional catalog file (TOML) merged over the built-ins.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Restrict findings to these files (repeatable).
        #[arg(long = "target")]
        targets: Vec<PathBuf>,

        /// Exit with code 1 when a finding at or above this severity is
        /// present.
        #[arg(long, value_enum, default_value_t = FailOn::High)]
        fail_on: FailOn,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Print progress information to stderr.
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Tier {
    Community,
    Pro,
    Enterprise,
}

impl Tier {
    fn limits(self) -> TierLimits {
        match self {
            Tier::Community => TierLimits::community(),
            Tier::Pro => TierLimits::pro(),
            Tier::Enterprise => TierLimits::enterprise(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FailOn {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl From<FailOn> for Severity {
    fn from(value: FailOn) -> Self {
        match value {
            FailOn::Info => Severity::Info,
            FailOn::Low => Severity::Low,
            FailOn::Medium => Severity::Medium,
            FailOn::High => Severity::High,
            FailOn::Critical => Severity::Critical,
        }
    }
}

/// On-disk shape of an AST bundle.
#[derive(Debug, Deserialize)]
struct Bundle {
    project_root: PathBuf,
    modules: Vec<ModuleInput>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Analyze {
            bundle,
            tier,
            depth,
            flows,
            catalog,
            targets,
            fail_on,
            pretty,
            verbose,
        } => {
            let text = fs::read_to_string(&bundle)
                .with_context(|| format!("reading bundle {}", bundle.display()))?;
            let bundle: Bundle = serde_json::from_str(&text)
                .with_context(|| "parsing AST bundle".to_owned())?;

            if verbose {
                eprintln!(
                    "Analyzing {} modules under {}...",
                    bundle.modules.len(),
                    bundle.project_root.display()
                );
            }

            let mut engine = Engine::new();
            if let Some(path) = catalog {
                let extra = custom::load_catalog(&path)
                    .with_context(|| format!("loading catalog {}", path.display()))?;
                engine = engine.with_catalog(extra);
            }

            let request = AnalysisRequest {
                project_root: bundle.project_root,
                target_modules: (!targets.is_empty()).then(|| targets.into_iter().collect()),
                requested_depth: depth,
                include_flows: flows,
                tier_limits: tier.limits(),
            };

            let mut cache = GraphCache::new();
            let cancel = CancelFlag::new();
            let response = engine.analyze(&request, bundle.modules, &mut cache, &cancel);

            if verbose {
                eprintln!(
                    "Visited {} modules: {} findings, {} diagnostics",
                    response.metadata.modules_visited,
                    response.vulnerabilities.len(),
                    response.diagnostics.len()
                );
                if response.metadata.truncated {
                    eprintln!("Propagation was truncated by the depth or module budget");
                }
            }

            let rendered = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{rendered}");

            Ok(exit_code(&response, fail_on.into()))
        }
    }
}

fn exit_code(response: &AnalysisResponse, threshold: Severity) -> ExitCode {
    if !response.success {
        return ExitCode::from(2);
    }
    let failing = response
        .vulnerabilities
        .iter()
        .any(|finding| finding.severity >= threshold);
    if failing {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
