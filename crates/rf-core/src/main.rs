//! rf-core command line.
//!
//! Results go to stdout (JSON or text), logs to stderr. The process exit code
//! is one of [`ExitCode`].

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use rf_common::{Remaining, SCHEMA_VERSION};
use rf_config::{resolve_config, validate_config, EngineConfig, ValidationError};
use rf_core::logging::{init_logging, LogFormat};
use rf_core::{
    Checkpoint, CheckpointResolver, ExitCode, LeakageClassifier, LeakageManifest, Pipeline,
    PipelineError, RunOptions, TracingProgress,
};
use rf_telemetry::reader::read_features;
use rf_telemetry::SnapshotPaths;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum OutputFormat {
    Json,
    #[default]
    Text,
}

/// Sectional checkpoint resolution and leakage-safe feature derivation.
#[derive(Parser, Debug)]
#[command(name = "rf-core", version, about)]
struct Cli {
    /// Output format for results on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Engine configuration file (overrides RF_CONFIG and the XDG location)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backfill, sync, derive and strip leakage over a snapshot directory
    Run {
        /// Snapshot directory with the four Parquet tables
        #[arg(long, value_name = "DIR")]
        snapshot: PathBuf,
        /// Output directory (defaults to updating the snapshot in place)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Keep forbidden columns (never use the output for training)
        #[arg(long)]
        skip_leakage: bool,
    },
    /// Resolve the traveled checkpoint for a race distance at a venue
    Resolve {
        /// Race distance in metres
        #[arg(long)]
        distance: u32,
        /// Venue (track name)
        #[arg(long)]
        venue: String,
        /// Distance remaining: 800 or 400
        #[arg(long, value_parser = parse_remaining)]
        remaining: Remaining,
    },
    /// Check a snapshot's feature table for forbidden columns
    Validate {
        #[arg(long, value_name = "DIR")]
        snapshot: PathBuf,
    },
    /// Print the leakage manifest
    Manifest,
    /// Inspect engine configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration and where it came from
    Show,
    /// Print the JSON schema of the configuration file
    Schema,
    /// Validate a configuration file (or the effective configuration)
    Validate {
        file: Option<PathBuf>,
    },
}

fn parse_remaining(s: &str) -> Result<Remaining, String> {
    s.trim()
        .trim_end_matches('m')
        .parse::<u32>()
        .ok()
        .and_then(Remaining::from_metres)
        .ok_or_else(|| format!("expected 800 or 400, got '{}'", s))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    let code = match &cli.command {
        Commands::Run {
            snapshot,
            out,
            skip_leakage,
        } => run_pipeline(cli.format, config, snapshot, out.as_deref(), *skip_leakage),
        Commands::Resolve {
            distance,
            venue,
            remaining,
        } => run_resolve(cli.format, config, *distance, venue, *remaining),
        Commands::Validate { snapshot } => run_validate(cli.format, config, snapshot),
        Commands::Manifest => run_manifest(cli.format, config),
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(cli.format, config),
            ConfigCommands::Schema => run_config_schema(),
            ConfigCommands::Validate { file } => {
                run_config_validate(cli.format, config, file.as_deref())
            }
        },
    };
    std::process::exit(code.as_i32());
}

// ── Output helpers ──────────────────────────────────────────────────────

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

fn fail(format: OutputFormat, code: ExitCode, err: &dyn std::fmt::Display) -> ExitCode {
    tracing::error!(exit_code = code.as_i32(), "{}", err);
    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "status": "error",
            "exit_code": code.as_i32(),
            "error": err.to_string(),
        })),
        OutputFormat::Text => eprintln!("error: {}", err),
    }
    code
}

fn load_config(format: OutputFormat, path: Option<&Path>) -> Result<EngineConfig, ExitCode> {
    resolve_config(path)
        .map(|(config, _)| config)
        .map_err(|e| fail(format, ExitCode::ConfigError, &e))
}

fn manifest_for(format: OutputFormat, config: &EngineConfig) -> Result<LeakageManifest, ExitCode> {
    LeakageManifest::with_extra_suspects(&config.leakage.extra_suspect_columns)
        .map_err(|e| fail(format, ExitCode::ConfigError, &e))
}

// ── Commands ────────────────────────────────────────────────────────────

fn run_pipeline(
    format: OutputFormat,
    config_path: Option<&Path>,
    snapshot: &Path,
    out: Option<&Path>,
    skip_leakage: bool,
) -> ExitCode {
    let (config, config_snapshot) = match resolve_config(config_path) {
        Ok(resolved) => resolved,
        Err(e) => return fail(format, ExitCode::ConfigError, &e),
    };
    let pipeline = match Pipeline::new(&config, config_snapshot) {
        Ok(pipeline) => pipeline,
        Err(e) => return fail(format, e.exit_code(), &e),
    };
    let mut options = RunOptions::new(snapshot);
    options.out = out.map(Path::to_path_buf);
    options.skip_leakage = skip_leakage;

    let report = match pipeline.run(&options, &TracingProgress) {
        Ok(report) => report,
        Err(e) => return pipeline_failure(format, e),
    };
    match format {
        OutputFormat::Json => match serde_json::to_value(&report) {
            Ok(value) => print_json(&value),
            Err(e) => return fail(format, ExitCode::InternalError, &e),
        },
        OutputFormat::Text => {
            println!("run {} complete in {}ms", report.run_id, report.duration_ms);
            for pass in &report.stages.backfill.passes {
                println!(
                    "  backfill {}: {} pending, {} written, {} unresolvable ({} via runner number)",
                    pass.target,
                    pass.pending,
                    pass.written,
                    pass.unresolvable_total(),
                    pass.fallback_matches
                );
            }
            let sync = &report.stages.sync;
            println!(
                "  sync: {} filled, {} conflicts kept, {} results without a feature row",
                sync.filled, sync.conflicts_kept, sync.missing_feature_rows
            );
            println!(
                "  derive: {} rows, {} runners, {} undated",
                report.stages.derive.rows,
                report.stages.derive.history.runners,
                report.stages.derive.history.undated_rows
            );
            match &report.stages.leakage {
                Some(leakage) => println!(
                    "  leakage: {} dropped, {} kept (manifest {} {})",
                    leakage.dropped.len(),
                    leakage.kept.len(),
                    leakage.manifest_version,
                    &leakage.fingerprint[..12]
                ),
                None => println!("  leakage: skipped"),
            }
            println!("  output: {}", report.output_dir.display());
        }
    }
    ExitCode::Clean
}

fn pipeline_failure(format: OutputFormat, err: PipelineError) -> ExitCode {
    let code = err.exit_code();
    fail(format, code, &err)
}

fn run_resolve(
    format: OutputFormat,
    config_path: Option<&Path>,
    distance: u32,
    venue: &str,
    remaining: Remaining,
) -> ExitCode {
    let config = match load_config(format, config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let resolver = match CheckpointResolver::from_config(&config) {
        Ok(resolver) => resolver,
        Err(e) => return fail(format, ExitCode::ConfigError, &e),
    };
    let profile = config.venue_registry().venue_profile(Some(venue));
    let checkpoint = resolver.resolve(distance, profile.family, remaining);

    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "distance_m": distance,
            "venue": venue,
            "jurisdiction": profile.jurisdiction,
            "family": profile.family,
            "remaining": remaining,
            "checkpoint": checkpoint,
        })),
        OutputFormat::Text => match checkpoint {
            Checkpoint::Traveled { traveled_m } => println!(
                "{}m at {} ({}, {}), {} to go: {}m traveled",
                distance, venue, profile.jurisdiction, profile.family, remaining, traveled_m
            ),
            Checkpoint::NotAvailable => println!(
                "{}m at {} ({}, {}), {} to go: not available",
                distance, venue, profile.jurisdiction, profile.family, remaining
            ),
        },
    }
    ExitCode::Clean
}

fn run_validate(format: OutputFormat, config_path: Option<&Path>, snapshot: &Path) -> ExitCode {
    let config = match load_config(format, config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let manifest = match manifest_for(format, &config) {
        Ok(manifest) => manifest,
        Err(code) => return code,
    };
    let paths = SnapshotPaths::new(snapshot);
    let table = match read_features(&paths.features()) {
        Ok(table) => table,
        Err(e) => {
            return pipeline_failure(format, PipelineError::Telemetry(e));
        }
    };
    let classifier = LeakageClassifier::new(manifest);
    let forbidden = classifier.forbidden_columns(&table);

    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "status": if forbidden.is_empty() { "clean" } else { "violation" },
            "columns": table.columns().len(),
            "forbidden": forbidden,
            "manifest_version": classifier.manifest().version,
            "fingerprint": classifier.manifest().fingerprint(),
        })),
        OutputFormat::Text => {
            if forbidden.is_empty() {
                println!("{} columns, no forbidden columns", table.columns().len());
            }
            for column in &forbidden {
                println!("forbidden: {} ({})", column.column, column.group);
            }
        }
    }
    match classifier.validate(&table) {
        Ok(()) => ExitCode::Clean,
        Err(_) => ExitCode::LeakageViolation,
    }
}

fn run_manifest(format: OutputFormat, config_path: Option<&Path>) -> ExitCode {
    let config = match load_config(format, config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let manifest = match manifest_for(format, &config) {
        Ok(manifest) => manifest,
        Err(code) => return code,
    };
    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "manifest": manifest,
            "fingerprint": manifest.fingerprint(),
        })),
        OutputFormat::Text => {
            println!("leakage manifest {} ({})", manifest.version, manifest.fingerprint());
            for group in &manifest.groups {
                println!("{}:", group.group);
                println!("  forbidden: {}", group.members.join(", "));
                println!("  use instead: {}", group.counterparts.join(", "));
            }
        }
    }
    ExitCode::Clean
}

fn run_config_show(format: OutputFormat, config_path: Option<&Path>) -> ExitCode {
    let (config, snapshot) = match resolve_config(config_path) {
        Ok(resolved) => resolved,
        Err(e) => return fail(format, ExitCode::ConfigError, &e),
    };
    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "source": snapshot,
            "config": config,
        })),
        OutputFormat::Text => {
            let path = snapshot
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            println!("source: {} ({})", snapshot.source, path);
            println!("sha256: {}", snapshot.sha256);
            println!("sanity_bound: {}", config.sanity_bound);
            println!(
                "history: wet >= {}, dry >= {}, baseline {}, amplifier {}",
                config.history.wet_min_starts,
                config.history.dry_min_starts,
                config.history.baseline_win_rate,
                config.history.match_amplifier
            );
            println!("checkpoint entries: {}", config.checkpoint_entries().len());
            println!("venues: {}", config.venue_registry().venue_count());
        }
    }
    ExitCode::Clean
}

fn run_config_schema() -> ExitCode {
    print_json(&EngineConfig::json_schema());
    ExitCode::Clean
}

fn run_config_validate(
    format: OutputFormat,
    config_path: Option<&Path>,
    file: Option<&Path>,
) -> ExitCode {
    let loaded: Result<EngineConfig, ValidationError> = match file.or(config_path) {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => return fail(format, ExitCode::ConfigError, &e),
    };
    let result = validate_config(&config);
    match format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "valid": result.is_ok(),
            "errors": result.errors,
            "warnings": result.warnings,
        })),
        OutputFormat::Text => {
            for err in &result.errors {
                println!("error: {}", err);
            }
            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            if result.is_ok() {
                println!("configuration is valid");
            }
        }
    }
    if result.is_ok() {
        ExitCode::Clean
    } else {
        ExitCode::ConfigError
    }
}
