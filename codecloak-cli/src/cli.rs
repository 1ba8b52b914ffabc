use crate::batch::{self, FileOutcome};
use crate::discovery;
use crate::metrics::Metrics;
use crate::output::OutputPolicy;
use crate::settings::{self, CliOverrides};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use codecloak_core::Obfuscator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "codecloak", version)]
#[command(about = "Obfuscate JavaScript files with preset-driven settings")]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Obfuscate a file, a directory or every file matching a glob pattern
    Obfuscate(ObfuscateArgs),
    /// Print the engine options a preset resolves to
    Presets {
        /// low, medium or high
        preset: Option<String>,
        /// JSON configuration file whose overrides are applied
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ObfuscateArgs {
    /// File, directory or glob pattern
    pub input: String,

    /// Output file, or directory when several files are processed
    #[arg(short, long, conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// low, medium or high
    #[arg(short, long)]
    pub preset: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overwrite the input files
    #[arg(long)]
    pub in_place: bool,

    /// Skip files matching this glob pattern (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Files processed concurrently (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,
}

pub async fn obfuscate_command(args: ObfuscateArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    // discovered paths are canonical
    let cwd = discovery::canonical(&cwd);
    let overrides = CliOverrides {
        preset: args.preset.clone(),
        seed: args.seed,
    };
    let config = settings::load(args.config.as_deref(), &overrides)?;
    settings::validate(&config)?;

    let files = discovery::discover(&args.input, &args.exclude, &cwd)?;
    let policy = OutputPolicy::choose(args.output.as_deref(), args.in_place, files.len());
    let jobs: Vec<(PathBuf, PathBuf)> = files
        .into_iter()
        .map(|input| {
            let output = policy.target(&input, &cwd);
            (input, output)
        })
        .collect();
    let concurrency = args.jobs.unwrap_or_else(num_cpus::get).max(1);

    info!(
        files = jobs.len(),
        preset = config.preset.as_deref().unwrap_or("medium"),
        concurrency,
        "obfuscating"
    );

    let metrics = Metrics::new().context("cannot register metrics")?;
    let report = batch::run(
        Arc::new(Obfuscator::new()),
        Arc::new(config),
        jobs,
        concurrency,
        |outcome| {
            metrics.record(outcome);
            println!("{}", outcome_line(outcome, &cwd));
        },
    )
    .await;

    println!("Obfuscated {} of {} files", report.succeeded(), report.total());

    if let Some(path) = &args.metrics_file {
        let text = metrics.render().context("cannot render metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("cannot write metrics to {}", path.display()))?;
    }

    if report.failed() > 0 {
        bail!("{} of {} files failed", report.failed(), report.total());
    }
    Ok(())
}

pub fn presets_command(preset: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let overrides = CliOverrides { preset, seed: None };
    let config = settings::load(config.as_deref(), &overrides)?;
    let options = settings::validate(&config)?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

fn outcome_line(outcome: &FileOutcome, cwd: &Path) -> String {
    let input = display_path(&outcome.input, cwd);
    match &outcome.result {
        Ok(_) => format!("✓ {} -> {}", input, display_path(&outcome.output, cwd)),
        Err(e) => format!("✗ {}: {}", input, e),
    }
}

fn display_path(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FileError, FileStats};
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn in_place_conflicts_with_output() {
        let result = Cli::try_parse_from([
            "codecloak",
            "obfuscate",
            "src",
            "--in-place",
            "--output",
            "dist",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_obfuscate_flags() {
        let cli = Cli::try_parse_from([
            "codecloak",
            "--log-json",
            "obfuscate",
            "src/**/*.js",
            "-p",
            "high",
            "--exclude",
            "vendor/**",
            "--exclude",
            "*.min.js",
            "-j",
            "3",
            "--seed",
            "7",
        ])
        .unwrap();
        assert!(cli.log_json);
        let Commands::Obfuscate(args) = cli.command else {
            panic!("expected obfuscate");
        };
        assert_eq!(args.input, "src/**/*.js");
        assert_eq!(args.preset.as_deref(), Some("high"));
        assert_eq!(args.exclude, vec!["vendor/**", "*.min.js"]);
        assert_eq!(args.jobs, Some(3));
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn outcome_lines_are_relative_to_cwd() {
        let cwd = Path::new("/work");
        let ok = FileOutcome {
            input: PathBuf::from("/work/src/a.js"),
            output: PathBuf::from("/work/src/a.obfuscated.js"),
            result: Ok(FileStats::default()),
        };
        assert_eq!(outcome_line(&ok, cwd), "✓ src/a.js -> src/a.obfuscated.js");

        let failed = FileOutcome {
            input: PathBuf::from("/work/b.js"),
            output: PathBuf::from("/work/b.obfuscated.js"),
            result: Err(FileError::Worker {
                path: PathBuf::from("/work/b.js"),
                message: "cancelled".into(),
            }),
        };
        assert!(outcome_line(&failed, cwd).starts_with("✗ b.js: worker for /work/b.js stopped"));
    }
}
