//! Command line interface for the plan execution engine.
//!
//! Plans come either from the built-in example catalog or from a directory of
//! YAML/JSON plan files (`--plans-dir`). Runs stream their lifecycle events as
//! they happen, either human-readable or as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use chainrun_engine::{ToolRegistry, run_plan};
use chainrun_store::{DirPlanStore, MemoryPlanStore, PlanStore};
use chainrun_tools::{DelayConfig, demo_plans, demo_registry};
use chainrun_types::{ExecutionResult, Plan, RunEvent, Verdict};

#[derive(Parser)]
#[command(name = "chainrun", about = "Run declarative tool plans", version)]
struct Cli {
    /// Directory of plan files to use instead of the built-in examples.
    #[arg(long, global = true, value_name = "DIR")]
    plans_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available plans.
    List,
    /// Print one plan in full.
    Show {
        /// Plan id to show.
        plan_id: String,
        /// Emit JSON instead of YAML.
        #[arg(long)]
        json: bool,
    },
    /// List the registered tools.
    Tools,
    /// Execute a plan and stream its events.
    Run {
        /// Plan id to run. Omit when using --file.
        plan_id: Option<String>,
        /// Run a plan straight from a file instead of the store.
        #[arg(long, value_name = "PATH", conflicts_with = "plan_id")]
        file: Option<PathBuf>,
        /// Emit every event as a JSON line instead of human-readable output.
        #[arg(long)]
        json: bool,
        /// Add realistic per-tool delays, like a live demo.
        #[arg(long)]
        slow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let store = open_store(cli.plans_dir.as_deref())?;

    match cli.command {
        Command::List => list_plans(store.as_ref()),
        Command::Show { plan_id, json } => show_plan(store.as_ref(), &plan_id, json),
        Command::Tools => list_tools(),
        Command::Run {
            plan_id,
            file,
            json,
            slow,
        } => {
            let plan = match (plan_id, file) {
                (_, Some(path)) => load_plan_file(&path)?,
                (Some(id), None) => store
                    .get(&id)?
                    .with_context(|| format!("no plan named '{id}'"))?,
                (None, None) => bail!("pass a plan id or --file"),
            };
            let delay = if slow {
                DelayConfig::range_ms(1000, 3000)
            } else {
                DelayConfig::disabled()
            };
            run(&plan, Arc::new(demo_registry(delay)), json).await
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(plans_dir: Option<&std::path::Path>) -> Result<Box<dyn PlanStore>> {
    match plans_dir {
        Some(dir) => Ok(Box::new(DirPlanStore::new(dir))),
        None => Ok(Box::new(MemoryPlanStore::seeded(demo_plans())?)),
    }
}

fn load_plan_file(path: &std::path::Path) -> Result<Plan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let plan: Plan = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?
    };
    plan.validate()
        .with_context(|| format!("{} failed validation", path.display()))?;
    Ok(plan)
}

fn list_plans(store: &dyn PlanStore) -> Result<()> {
    for plan in store.list()? {
        let name = plan.name.as_deref().unwrap_or("");
        println!(
            "{:<24} {:<28} {} steps",
            plan.display_id(),
            name,
            plan.steps.len()
        );
    }
    Ok(())
}

fn show_plan(store: &dyn PlanStore, plan_id: &str, json: bool) -> Result<()> {
    let plan = store
        .get(plan_id)?
        .with_context(|| format!("no plan named '{plan_id}'"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", serde_yaml::to_string(&plan)?);
    }
    Ok(())
}

fn list_tools() -> Result<()> {
    let registry = demo_registry(DelayConfig::disabled());
    for (name, description) in registry.list() {
        println!("{:<20} {}", name, description.unwrap_or(""));
    }
    Ok(())
}

async fn run(plan: &Plan, registry: Arc<ToolRegistry>, json: bool) -> Result<()> {
    let mut event_rx = run_plan(plan, registry)?;

    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            render_event(&event);
        }
        events.push(event);
    }

    let result =
        ExecutionResult::from_events(events).context("run ended without a FINISH event")?;
    if !json {
        render_summary(&result);
    }

    match result.verdict {
        Verdict::Success => Ok(()),
        Verdict::InterventionNeeded => std::process::exit(2),
        Verdict::Failure | Verdict::Unknown => std::process::exit(1),
    }
}

fn render_event(event: &RunEvent) {
    match event {
        RunEvent::Start { plan_id, .. } => {
            println!("starting {}", plan_id.as_deref().unwrap_or("<unnamed>"));
        }
        RunEvent::StepStart {
            step_index,
            step_id,
            message,
            ..
        } => {
            println!("  [{}] {} - {}", step_index + 1, step_id, message);
        }
        RunEvent::StepSkipped { step_id, reason } => {
            println!("  [skip] {step_id}: {reason}");
        }
        RunEvent::StepComplete { step_id, .. } => {
            println!("  [done] {step_id}");
        }
        RunEvent::InterventionNeeded { step_id, reason, .. } => {
            println!("  [intervention] {step_id}: {reason}");
        }
        RunEvent::Error { step_id, error, .. } => {
            println!("  [error] {step_id}: {error}");
        }
        RunEvent::Finish { .. } => {}
    }
}

fn render_summary(result: &ExecutionResult) {
    println!();
    println!("verdict: {:?}", result.verdict);
    println!(
        "steps completed: {} in {} ms",
        result.steps_completed, result.duration_ms
    );
    if let Some(reason) = &result.intervention_reason {
        println!("intervention: {reason}");
    }
    if let Some(error) = &result.error {
        println!("error: {error}");
    }
    if !result.critical_findings.is_empty() {
        println!("critical findings:");
        for (step_id, finding) in &result.critical_findings {
            let rendered =
                serde_json::to_string(finding).unwrap_or_else(|_| "<unprintable>".to_string());
            println!("  {step_id}: {rendered}");
        }
    }
}
