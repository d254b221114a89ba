//! `cavity-scan` command-line interface.
//!
//! ```sh
//! cavity-scan run 1.0 0.05 100000 data
//! cavity-scan run -2 20 5000 --preset legacy
//! cavity-scan list data
//! cavity-scan show data/beta_1.0_x0_0.05_simulation_iterations_100000.npz
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;
use serde::Deserialize;

use cavity_scan::persist::{list_results, read_records, write_atomic};
use cavity_scan::runner::output_file_name;
use cavity_scan::{ScanConfig, ScanError, ScanPreset, ScanRunner, SolverPolicy};

const DEFAULT_DEST_DIR: &str = "data";

#[derive(Parser)]
#[command(name = "cavity-scan")]
#[command(about = "Thermo-optic cavity scan simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the up and down scans of one parameter set and store the arrays.
    Run(RunArgs),
    /// List stored result archives.
    List {
        /// Directory holding the archives.
        #[arg(default_value = DEFAULT_DEST_DIR)]
        dir: PathBuf,
    },
    /// Print the records of a result archive.
    Show {
        /// Path to the archive.
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Temperature contribution to the frequency offset (beta).
    #[arg(allow_negative_numbers = true)]
    beta: Option<String>,
    /// Frequency scan speed (x0), strictly positive.
    x0: Option<String>,
    /// Number of fixed-point iterations per scan direction.
    iterations: Option<String>,
    /// Destination directory for the result archive.
    dest_dir: Option<PathBuf>,
    /// Parameter preset providing geometry, policy and defaults.
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,
    /// JSON run file; positional arguments and flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Resonance half-width in scan points.
    #[arg(long)]
    half_width: Option<usize>,
    /// Half-widths spanned on each side of the resonance center.
    #[arg(long)]
    n_widths: Option<usize>,
    /// Under-relaxation factor of the temperature update.
    #[arg(long)]
    learning_rate: Option<f64>,
    /// Iterations per residual sample (0 disables the trace).
    #[arg(long)]
    sample_interval: Option<usize>,
    /// Boxcar window applied to the filtered temperature (0 disables it).
    #[arg(long)]
    smoothing: Option<usize>,
    /// Log progress every this many iterations (0 disables it).
    #[arg(long)]
    report_every: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Cavity,
    Legacy,
}

impl From<PresetArg> for ScanPreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Cavity => ScanPreset::Cavity,
            PresetArg::Legacy => ScanPreset::Legacy,
        }
    }
}

/// Parameters read from a `--config` JSON file; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RunFile {
    preset: Option<ScanPreset>,
    coupling: Option<f64>,
    relaxation_constant: Option<f64>,
    iteration_count: Option<usize>,
    half_width: Option<usize>,
    n_widths: Option<usize>,
    policy: Option<SolverPolicy>,
    dest_dir: Option<PathBuf>,
}

/// A parsed number together with the text it came from, which names the output file.
struct Labelled<T> {
    value: T,
    label: String,
}

impl<T: std::fmt::Display> Labelled<T> {
    fn from_value(value: T) -> Self {
        let label = value.to_string();
        Self { value, label }
    }
}

fn parse_labelled<T>(raw: &str, name: &str) -> Result<Labelled<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = raw
        .trim()
        .parse::<T>()
        .with_context(|| format!("{name} must be a number, got '{raw}'"))?;
    Ok(Labelled {
        value,
        label: raw.trim().to_string(),
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::List { dir } => {
            for name in list_results(&dir)? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Show { file } => show(&file),
    }
}

/// Everything a `run` needs, after merging preset defaults, the run file and the command line.
struct ResolvedRun {
    config: ScanConfig,
    policy: SolverPolicy,
    dest_dir: PathBuf,
    beta: Labelled<f64>,
    x0: Labelled<f64>,
    iterations: Labelled<usize>,
}

impl ResolvedRun {
    fn file_name(&self) -> String {
        output_file_name(&self.beta.label, &self.x0.label, &self.iterations.label)
    }
}

fn run(args: RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => load_run_file(path)?,
        None => RunFile::default(),
    };
    let resolved = resolve(&args, file)?;

    println!("beta (temperature contribution to frequency offset): {}", resolved.beta.label);
    println!("x0 (frequency scan speed): {}", resolved.x0.label);
    println!("simulation iterations: {}", resolved.iterations.label);
    println!("scan points: {}", resolved.config.n_points());
    println!("dest_dir: {}", resolved.dest_dir.display());

    let runner = ScanRunner::new(resolved.config.clone(), resolved.policy.clone())
        .context("invalid solver policy")?;
    let result = runner.run();
    if result.diverged() {
        warn!("results contain non-finite values; the iteration did not converge");
    }

    let dest_dir = &resolved.dest_dir;
    let path = write_atomic(dest_dir, &resolved.file_name(), &result.records())
        .with_context(|| format!("could not store results in {}", dest_dir.display()))?;
    println!("temperature and power arrays saved to:\n{}", path.display());
    Ok(())
}

/// Precedence, lowest first: preset defaults, run file, command line.
fn resolve(args: &RunArgs, file: RunFile) -> Result<ResolvedRun> {
    let preset = args
        .preset
        .map(ScanPreset::from)
        .or(file.preset)
        .unwrap_or(ScanPreset::Cavity);

    let beta = match &args.beta {
        Some(raw) => parse_labelled::<f64>(raw, "beta")?,
        None => Labelled::from_value(file.coupling.unwrap_or(preset.default_coupling())),
    };
    let x0 = match &args.x0 {
        Some(raw) => parse_labelled::<f64>(raw, "x0")?,
        None => Labelled::from_value(file.relaxation_constant.unwrap_or(preset.default_relaxation())),
    };
    let iterations = match &args.iterations {
        Some(raw) => parse_labelled::<usize>(raw, "iterations")?,
        None => Labelled::from_value(file.iteration_count.unwrap_or(preset.default_iterations())),
    };
    let dest_dir = args
        .dest_dir
        .clone()
        .or(file.dest_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST_DIR));

    if preset.requires_non_negative_coupling() && beta.value < 0.0 {
        return Err(ScanError::NegativeCoupling {
            coupling: beta.value,
        }
        .into());
    }

    let config = ScanConfig::builder(beta.value, x0.value)
        .iteration_count(iterations.value)
        .half_width(args.half_width.or(file.half_width).unwrap_or(preset.half_width()))
        .n_widths(args.n_widths.or(file.n_widths).unwrap_or(preset.n_widths()))
        .build()
        .context("invalid scan parameters")?;
    let policy = resolve_policy(args, file.policy.unwrap_or_else(|| preset.policy()), iterations.value);

    Ok(ResolvedRun {
        config,
        policy,
        dest_dir,
        beta,
        x0,
        iterations,
    })
}

fn resolve_policy(args: &RunArgs, mut policy: SolverPolicy, iterations: usize) -> SolverPolicy {
    if let Some(rate) = args.learning_rate {
        policy = policy.with_learning_rate(rate);
    }
    if let Some(interval) = args.sample_interval {
        policy = policy.with_sample_interval(interval);
    }
    if let Some(window) = args.smoothing {
        policy = policy.with_smoothing(window);
    }
    match args.report_every {
        Some(every) => policy.with_progress(every),
        None if policy.report_every.is_none() => policy.with_progress(iterations / 10),
        None => policy,
    }
}

fn load_run_file(path: &Path) -> Result<RunFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read run file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse run file {}", path.display()))
}

fn show(path: &Path) -> Result<()> {
    let records = read_records(path)?;
    if records.is_empty() {
        bail!("{} contains no records", path.display());
    }
    println!("{}", path.display());
    for (name, values) in &records {
        match values.last() {
            Some(last) if name.starts_with("delta_abs") => {
                println!("  {name}: {} samples, final residual {last:.3e}", values.len())
            }
            _ => println!("  {name}: {} values", values.len()),
        }
    }
    Ok(())
}
