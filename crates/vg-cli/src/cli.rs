use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vg",
    about = "Virus genealogy — build, query and prune a genealogy from a command script",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a script and print every query result
    Run(RunArgs),
    /// Execute a script, validating the genealogy after every change
    Check(CheckArgs),
    /// Execute a script, then show what removing a virus would take down
    Plan(PlanArgs),
}

#[derive(Args)]
pub struct ScriptArgs {
    /// Script file; `-` or nothing reads standard input
    pub script: Option<PathBuf>,
    /// Identifier of the stem virus
    #[arg(long)]
    pub stem: String,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub script: ScriptArgs,
    /// Stop at the first failing step
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub script: ScriptArgs,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub script: ScriptArgs,
    /// Virus whose removal is planned
    #[arg(long)]
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plan_with_global_flags() {
        let cli = Cli::try_parse_from([
            "vg", "plan", "genealogy.vg", "--stem", "A", "--target", "B", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.script.stem, "A");
        assert_eq!(args.target, "B");
        assert_eq!(args.script.script, Some(PathBuf::from("genealogy.vg")));
    }

    #[test]
    fn stem_is_required() {
        assert!(Cli::try_parse_from(["vg", "run", "script.vg"]).is_err());
    }
}
