mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use common::scenario::{TickMode, get_scenario, list_scenarios};
use common::{parse_seeds, split_csv};
use logic::{ScenarioResult, SessionTester};
use taskdex_game::{EngineConfig, catalog};

#[derive(Debug, Parser)]
#[command(name = "taskdex-tester", version = "0.1.0")]
#[command(about = "Automated QA for the TaskDex engine - scripted focus sessions across seeds")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Engine config JSON; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Real milliseconds per timer second (0 ticks as fast as possible)
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = load_engine_config(args.config.as_deref())?;
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds)?;
    let tester = SessionTester::new(config, TickMode::from_millis(args.tick_ms), args.verbose);

    let results = run_scenarios(&tester, &scenarios, &seeds, args.iterations).await;

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 TaskDex Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_json(&raw)
                .with_context(|| format!("invalid engine config {}", path.display()))?
        }
        None => EngineConfig::default_config(),
    };
    config
        .validate_against(catalog::builtin())
        .context("engine config does not match the species catalog")?;
    Ok(config)
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

async fn run_scenarios(
    tester: &SessionTester,
    scenarios: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Session Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let mut results = Vec::new();
    for scenario_name in scenarios {
        let Some(scenario) = get_scenario(scenario_name) else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
            continue;
        };
        results.extend(
            tester
                .run_scenario(scenario.as_ref(), seeds, iterations)
                .await,
        );
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# TaskDex Session Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            let duration = start_time.elapsed();
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
