use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use nnlink_core::{init_tracing, FailurePolicy};
use nnlink_sim::{run_scenario, Scenario};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("nnlink-sim")
        .version(nnlink_sim::VERSION)
        .about("Run association control scenarios against an in-memory host")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug events (RUST_LOG takes precedence)"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a scenario and report each step")
                .arg(
                    Arg::new("scenario")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Scenario file (.yaml, .yml or .json)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                )
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_parser(["rollback", "keep"])
                        .help("Override the scenario's failure policy"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a scenario without running it")
                .arg(
                    Arg::new("scenario")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Scenario file (.yaml, .yml or .json)"),
                ),
        )
}

fn scenario_arg(args: &clap::ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("scenario")
        .context("missing scenario path")
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let directive = if matches.get_flag("verbose") { "debug" } else { "warn" };
    init_tracing(directive, false);

    match matches.subcommand() {
        Some(("run", args)) => {
            let path = scenario_arg(args)?;
            let scenario = Scenario::load(path).with_context(|| format!("loading {}", path.display()))?;
            let policy = match args.get_one::<String>("policy").map(String::as_str) {
                Some("keep") => Some(FailurePolicy::KeepOptimistic),
                Some(_) => Some(FailurePolicy::Rollback),
                None => None,
            };

            let report = run_scenario(&scenario, policy).await;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("check", args)) => {
            let path = scenario_arg(args)?;
            let scenario = Scenario::load(path).with_context(|| format!("loading {}", path.display()))?;
            println!("{}: ok ({} steps)", scenario.name, scenario.steps.len());
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
