use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use report_core::protocol::{MapReport, UuidIds};
use report_core::{
    clean_report, dangling_layer_references, hydrate_report, migrate_with_report,
    DanglingReference, ReportConfig, ReportFactory, Sanitizer,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mapreport")]
#[command(about = "Migrate, check and prepare map report documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file overriding sanitizer and factory defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade a stored displayOptions value to the current shape
    Migrate(InputArgs),

    /// Migrate a report and drop references to layers it does not have
    Clean(InputArgs),

    /// List layer references that do not resolve (exit status 1 if any)
    Check(InputArgs),

    /// Create a report bound to one data source
    New(NewArgs),

    /// Strip a report entity down to the update mutation input
    Sanitize(InputArgs),

    /// Print the JSON Schema of a report document
    Schema,
}

#[derive(Args)]
struct InputArgs {
    /// JSON file to read; stdin when omitted or "-"
    input: Option<PathBuf>,
}

#[derive(Args)]
struct NewArgs {
    /// Name of the data source; also used for the report and layer names
    #[arg(long)]
    source_name: String,

    /// Id of the data source the layer binds to
    #[arg(long)]
    source_id: String,
}

#[derive(Serialize)]
struct CheckOutput {
    report_id: String,
    dangling: Vec<DanglingReference>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = match &cli.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    match cli.command {
        Commands::Migrate(args) => run_migrate(&args),
        Commands::Clean(args) => run_clean(&args),
        Commands::Check(args) => run_check(&args),
        Commands::New(args) => run_new(&args, &config),
        Commands::Sanitize(args) => run_sanitize(&args, &config),
        Commands::Schema => {
            print_json(&schemars::schema_for!(MapReport))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_migrate(args: &InputArgs) -> Result<ExitCode> {
    let raw = read_json(args.input.as_deref())?;
    let (options, report) = migrate_with_report(&raw, &mut UuidIds);
    if report.is_noop() {
        log::info!("displayOptions already current");
    } else {
        let steps: Vec<&str> = report.steps.iter().map(|step| step.name()).collect();
        log::info!(
            "migrated from {} via [{}]",
            report
                .from_version
                .map_or_else(|| "unrecognized input".to_string(), |v| format!("v{v}")),
            steps.join(", ")
        );
    }
    print_json(&options)?;
    Ok(ExitCode::SUCCESS)
}

fn run_clean(args: &InputArgs) -> Result<ExitCode> {
    let report = load_report(args.input.as_deref())?;
    print_json(&clean_report(&report))?;
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: &InputArgs) -> Result<ExitCode> {
    let report = load_report(args.input.as_deref())?;
    let dangling = dangling_layer_references(&report.display_options, &report.layer_ids());
    let clean = dangling.is_empty();
    if !clean {
        log::warn!(
            "report {} has {} dangling layer references",
            report.id,
            dangling.len()
        );
    }
    print_json(&CheckOutput {
        report_id: report.id,
        dangling,
    })?;
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_new(args: &NewArgs, config: &ReportConfig) -> Result<ExitCode> {
    let factory = ReportFactory::new(config.factory.clone());
    let report = factory.create(&args.source_name, &args.source_id, &mut UuidIds);
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

fn run_sanitize(args: &InputArgs, config: &ReportConfig) -> Result<ExitCode> {
    let raw = read_json(args.input.as_deref())?;
    let input = Sanitizer::new(config.sanitize.clone())
        .prepare(&raw)
        .context("Cannot prepare mutation input")?;
    print_json(&input)?;
    Ok(ExitCode::SUCCESS)
}

fn load_report(path: Option<&Path>) -> Result<MapReport> {
    let raw = read_json(path)?;
    hydrate_report(&raw).context("Input is not a map report")
}

fn read_json(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Input is not valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
