use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, warn};
use vg_genealogy::{Genealogy, GenealogyError, RemovalPlan, SampleVirus};

use crate::cli::*;
use crate::script::{self, Line, Step};

/// The genealogy the harness drives.
pub type Lab = Genealogy<SampleVirus<String>>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Check(args) => cmd_check(args, cli.format),
        Command::Plan(args) => cmd_plan(args, cli.format),
    }
}

/// Result of executing one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Ids { ids: Vec<String> },
    Exists { exists: bool },
    Removed { plan: RemovalPlan<String> },
    Failed { kind: &'static str, message: String },
}

impl Outcome {
    fn failed(err: &GenealogyError<String>) -> Self {
        Self::Failed {
            kind: error_kind(err),
            message: err.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Serialize)]
struct Report<'a> {
    line: usize,
    command: String,
    outcome: &'a Outcome,
}

/// Stable, machine-readable name of an error kind.
pub fn error_kind(err: &GenealogyError<String>) -> &'static str {
    match err {
        GenealogyError::NotFound(_) => "not_found",
        GenealogyError::AlreadyExists(_) => "already_exists",
        GenealogyError::CannotRemoveStem(_) => "cannot_remove_stem",
        GenealogyError::NoParents(_) => "no_parents",
        GenealogyError::CycleDetected { .. } => "cycle_detected",
    }
}

/// Apply one step to the genealogy.
pub fn execute(lab: &mut Lab, step: &Step) -> Outcome {
    let result = match step {
        Step::Create { id, parents } => lab
            .create_with_parents(id.clone(), parents.iter().cloned())
            .map(|()| Outcome::Ok),
        Step::Connect { child, parent } => lab.connect(child, parent).map(|()| Outcome::Ok),
        Step::Remove { id } => lab.remove(id).map(|plan| Outcome::Removed { plan }),
        Step::Children { id } => lab.children_of(id).map(|ids| Outcome::Ids { ids }),
        Step::Parents { id } => lab.parents_of(id).map(|ids| Outcome::Ids { ids }),
        Step::Exists { id } => Ok(Outcome::Exists {
            exists: lab.exists(id),
        }),
        Step::Stem => Ok(Outcome::Ids {
            ids: vec![lab.stem_id().clone()],
        }),
    };
    result.unwrap_or_else(|err| Outcome::failed(&err))
}

fn read_script(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read script from stdin")?;
            Ok(source)
        }
    }
}

fn load(args: &ScriptArgs) -> anyhow::Result<(Lab, Vec<Line>)> {
    let source = read_script(args.script.as_deref())?;
    let lines = script::parse(&source)?;
    debug!(steps = lines.len(), stem = %args.stem, "script loaded");
    Ok((Lab::new(args.stem.clone()), lines))
}

fn print_outcome(line: &Line, outcome: &Outcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let report = Report {
                line: line.number,
                command: line.step.to_string(),
                outcome,
            };
            println!("{}", serde_json::to_string(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "{:>4}  {}  {}",
                line.number.to_string().dimmed(),
                line.step.to_string().bold(),
                render(outcome)
            );
        }
    }
    Ok(())
}

fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Ok => "ok".green().to_string(),
        Outcome::Ids { ids } if ids.is_empty() => "(none)".dimmed().to_string(),
        Outcome::Ids { ids } => ids.join(" ").cyan().to_string(),
        Outcome::Exists { exists } => {
            if *exists {
                "yes".green().to_string()
            } else {
                "no".yellow().to_string()
            }
        }
        Outcome::Removed { plan } if plan.cascade().is_empty() => {
            format!("{} {}", "removed".green(), plan.target)
        }
        Outcome::Removed { plan } => format!(
            "{} {} (cascade: {})",
            "removed".green(),
            plan.target,
            plan.cascade().join(", ").yellow()
        ),
        Outcome::Failed { kind, message } => format!("{} {}", kind.red().bold(), message),
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (mut lab, lines) = load(&args.script)?;
    let mut failures = 0;

    for line in &lines {
        let outcome = execute(&mut lab, &line.step);
        print_outcome(line, &outcome, format)?;
        if outcome.is_failure() {
            failures += 1;
            if args.fail_fast {
                bail!("line {}: `{}` failed", line.number, line.step);
            }
        }
    }

    if format == OutputFormat::Text {
        println!(
            "{} {} steps, {} failed, {} viruses",
            "✓".green().bold(),
            lines.len(),
            failures,
            lab.len()
        );
    }
    Ok(())
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (mut lab, lines) = load(&args.script)?;

    for line in &lines {
        let outcome = execute(&mut lab, &line.step);
        print_outcome(line, &outcome, format)?;
        if line.step.mutates() {
            lab.validate()
                .with_context(|| format!("line {}: `{}` broke the genealogy", line.number, line.step))?;
        }
    }

    if format == OutputFormat::Text {
        println!(
            "{} {} steps, invariants hold ({} viruses)",
            "✓".green().bold(),
            lines.len(),
            lab.len()
        );
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (mut lab, lines) = load(&args.script)?;

    for line in &lines {
        if let Outcome::Failed { kind, message } = execute(&mut lab, &line.step) {
            warn!(line = line.number, kind, %message, "step failed");
        }
    }

    let plan = lab.plan_removal(&args.target)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&plan)?),
        OutputFormat::Text => {
            println!("Removing {} takes down {} virus(es):", plan.target.yellow().bold(), plan.len());
            for id in &plan.removed {
                println!("  {} {}", "-".red(), id);
            }
            for (parent, child) in &plan.severed {
                println!("  {} {} -> {}", "severed".dimmed(), parent, child);
            }
        }
    }
    Ok(())
}
