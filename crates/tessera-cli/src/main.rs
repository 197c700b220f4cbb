//! Tessera CLI - decompose planning goals into agent subtasks

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tessera_core::config::Config;
use tessera_core::model::{Agent, PlanningModel, ProblemDocument};
use tessera_core::planner::Planner;
use tessera_core::report::{Outcome, PlanReport};
use tessera_core::roles::{RoleSchema, RoleSchemaDocument};
use tracing::info;

const EXIT_UNSATISFIABLE: u8 = 2;
const EXIT_ALLOCATION_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about = "Decompose planning goals into agent subtasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a problem into subtasks and allocate them to agents
    Plan {
        /// Problem document (JSON)
        problem: PathBuf,
        /// Role schema (JSON or TOML)
        roles: PathBuf,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override the subtask bound
        #[arg(short = 'k', long)]
        max_subtasks: Option<usize>,
        /// Use this configuration file instead of the default one
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the causal graph, landmarks and goal components of a problem
    Graph {
        /// Problem document (JSON)
        problem: PathBuf,
        /// Use this configuration file instead of the default one
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.quiet { "tessera=warn" } else { "tessera=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Plan {
            problem,
            roles,
            seed,
            max_subtasks,
            config,
            output,
        } => cmd_plan(
            PlanArgs {
                problem: &problem,
                roles: &roles,
                seed,
                max_subtasks,
                config: config.as_deref(),
                output: output.as_deref(),
            },
            cli.format,
            cli.quiet,
        ),

        Commands::Graph { problem, config } => {
            cmd_graph(&problem, config.as_deref(), cli.format)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { action } => {
            cmd_config(action, cli.quiet)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Print an error with its code and suggestion when it comes from the engine
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<tessera_core::Error>() {
        Some(engine) => {
            eprintln!("Error [{}]: {}", engine.code(), engine);
            if engine.is_configuration() {
                eprintln!("  No planning was attempted.");
            }
            if let Some(suggestion) = engine.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

struct PlanArgs<'a> {
    problem: &'a Path,
    roles: &'a Path,
    seed: Option<u64>,
    max_subtasks: Option<usize>,
    config: Option<&'a Path>,
    output: Option<&'a Path>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn load_problem(path: &Path) -> anyhow::Result<(PlanningModel, Vec<Agent>)> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem document {}", path.display()))?;
    let document = ProblemDocument::from_json(&contents)?;
    Ok(document.into_model()?)
}

fn cmd_plan(args: PlanArgs<'_>, format: OutputFormat, quiet: bool) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(k) = args.max_subtasks {
        config.retry.max_subtasks = k;
    }

    let (model, agents) = load_problem(args.problem)?;
    let schema = RoleSchema::load(args.roles)?;
    let planner = Planner::new(config, schema)?;
    let report = planner.plan(&model, &agents)?;

    if let Some(path) = args.output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print_report(&report, quiet),
    }

    Ok(match &report.outcome {
        Outcome::Solved { failures, .. } if failures.is_empty() => ExitCode::SUCCESS,
        Outcome::Solved { .. } => ExitCode::from(EXIT_ALLOCATION_FAILED),
        Outcome::Unsatisfiable { .. } => ExitCode::from(EXIT_UNSATISFIABLE),
        Outcome::Cancelled { .. } => ExitCode::FAILURE,
    })
}

fn print_report(report: &PlanReport, quiet: bool) {
    let diagnostics = &report.diagnostics;
    match &report.outcome {
        Outcome::Solved { subtasks, failures } => {
            println!(
                "Solved: {} goal(s) in {} subtask(s), {} unallocated",
                diagnostics.goals,
                subtasks.len(),
                failures.len()
            );
            if quiet {
                return;
            }
            println!();
            for subtask in subtasks {
                let goals: Vec<String> = subtask.goals.iter().map(ToString::to_string).collect();
                match (&subtask.agent, subtask.cost) {
                    (Some(agent), Some(cost)) => {
                        println!("  #{:<3} {} (cost {:.3})", subtask.id, agent, cost)
                    }
                    _ => println!("  #{:<3} UNALLOCATED", subtask.id),
                }
                println!("        goals: {}", goals.join(", "));
                if !subtask.signature.is_empty() {
                    let roles: Vec<String> = subtask
                        .signature
                        .iter()
                        .map(|(role, value)| format!("{}={}", role, value.values().collect::<Vec<_>>().join("|")))
                        .collect();
                    println!("        roles: {}", roles.join(" "));
                }
            }
            for failure in failures {
                println!("  ! subtask #{}: {}", failure.subtask_id, failure.reason);
            }
        }
        Outcome::Unsatisfiable {
            last_count,
            k_max,
            epsilon_schedule,
        } => {
            println!(
                "Unsatisfiable: {} subtask(s) left after {} attempt(s), bound is {}",
                last_count,
                diagnostics.attempts.len(),
                k_max
            );
            if !quiet {
                let schedule: Vec<String> = epsilon_schedule.iter().map(|e| format!("{:.2}", e)).collect();
                println!("  epsilon schedule: {}", schedule.join(", "));
                println!(
                    "  rejected merges: {} goal limit, {} no common source, {} type conflict, {} type role",
                    diagnostics.rejections.goal_limit,
                    diagnostics.rejections.no_common_source,
                    diagnostics.rejections.type_conflict,
                    diagnostics.rejections.type_role
                );
            }
        }
        Outcome::Cancelled { attempts } => println!("Cancelled after {} attempt(s)", attempts),
    }
}

fn cmd_graph(problem: &Path, config: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let (model, _) = load_problem(problem)?;
    let planner = Planner::new(config, RoleSchema::compile(RoleSchemaDocument::default())?)?;
    let structure = planner.structure(&model);
    let components = structure.graph.components();

    if format == OutputFormat::Json {
        let landmarks: Vec<Vec<&String>> = (0..model.goals().len())
            .map(|g| structure.landmarks.get(g).iter().collect())
            .collect();
        let value = serde_json::json!({
            "domain": model.domain(),
            "problem": model.problem(),
            "causal_graph": structure.causal.as_map(),
            "landmark_depth": structure.landmark_depth,
            "goals": model.goals(),
            "landmarks": landmarks,
            "components": components,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "Causal graph: {} edge(s) over {} predicate(s)",
        structure.causal.edge_count(),
        structure.causal.nodes().count()
    );
    for (from, targets) in structure.causal.as_map() {
        if !targets.is_empty() {
            let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
            println!("  {} -> {}", from, targets.join(", "));
        }
    }
    println!();
    println!("Landmarks (depth {}):", structure.landmark_depth);
    for (id, goal) in model.goals().iter().enumerate() {
        let landmarks: Vec<&str> = structure.landmarks.get(id).iter().map(String::as_str).collect();
        println!("  {:<3} {}: {}", id, goal, landmarks.join(", "));
    }
    println!();
    println!(
        "Goal graph: {} edge(s), {} component(s)",
        structure.graph.edge_count(),
        components.len()
    );
    for (i, component) in components.iter().enumerate() {
        let ids: Vec<String> = component.iter().map(ToString::to_string).collect();
        println!("  [{}] {}", i, ids.join(" "));
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_overrides_parse() {
        let cli = Cli::try_parse_from([
            "tessera", "plan", "p.json", "r.toml", "--seed", "7", "-k", "3", "--format", "json",
        ])
        .unwrap();
        assert!(cli.format == OutputFormat::Json);
        match cli.command {
            Commands::Plan { seed, max_subtasks, .. } => {
                assert_eq!(seed, Some(7));
                assert_eq!(max_subtasks, Some(3));
            }
            _ => panic!("expected plan"),
        }
    }
}
