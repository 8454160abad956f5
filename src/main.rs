//! Gait Plot - overlay figures of gait trials for comparison.
//!
//! Loads trial tables, labels each trial from its filename and draws one
//! figure per variable, either over the normalized gait cycle or over raw
//! frames, as PNG/SVG files or in an interactive terminal preview.

mod compose;
mod display;
mod error;
mod export;
mod figure;
mod gait;
mod label;
mod loader;
mod manifest;
mod plot;
mod style;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use compose::PlotComposer;
use export::{ExportOptions, TrialOptions};
use figure::PlotMode;
use gait::CycleBounds;
use loader::TrialTable;
use plot::OutputFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use style::StyleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Normalized,
    Raw,
    Both,
}

impl ModeArg {
    fn modes(self) -> Vec<PlotMode> {
        match self {
            ModeArg::Normalized => vec![PlotMode::Normalized],
            ModeArg::Raw => vec![PlotMode::Raw],
            ModeArg::Both => vec![PlotMode::Normalized, PlotMode::Raw],
        }
    }
}

/// Overlay plots of gait trials, one figure per variable
#[derive(Parser, Debug)]
#[command(name = "gaitplot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trial files or directories containing them (.csv, .sto, .txt)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Variable to plot (repeatable; default: every column shared by all trials)
    #[arg(long = "var")]
    var: Vec<String>,

    /// X-axis mode
    #[arg(short, long, value_enum, default_value = "both")]
    mode: ModeArg,

    /// Output directory for generated figures
    #[arg(short, long, default_value = "plots")]
    output: PathBuf,

    /// Image format
    #[arg(short, long, value_enum, default_value = "png")]
    format: OutputFormat,

    /// Preview figures in the terminal instead of writing files
    #[arg(long)]
    show: bool,

    /// List the variables shared by all trials and exit
    #[arg(long)]
    list: bool,

    /// JSON style file; missing keys keep their defaults
    #[arg(long)]
    style: Option<PathBuf>,

    /// Override the export resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Zero-based header row (default: detect)
    #[arg(long)]
    header_row: Option<usize>,

    /// Order trials by label value instead of input order
    #[arg(long)]
    sort_labels: bool,

    /// Shortest accepted gait cycle, in frames
    #[arg(long, default_value = "10")]
    min_cycle: usize,

    /// Longest accepted gait cycle, in frames
    #[arg(long, default_value = "1000")]
    max_cycle: usize,

    /// Figures rendered in parallel
    #[arg(short, long, default_value = "4")]
    jobs: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn load_style(args: &Args) -> Result<StyleConfig> {
    let style = match &args.style {
        Some(path) => StyleConfig::load(path)
            .with_context(|| format!("Failed to load style file: {}", path.display()))?,
        None => StyleConfig::default(),
    };
    let style = match args.dpi {
        Some(dpi) => style.with_dpi(dpi),
        None => style,
    };
    style.validate()?;
    Ok(style)
}

/// Expand directories into their supported trial files, sorted by name
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory: {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && loader::is_supported(p))
                .collect();
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

fn load_tables(inputs: &[PathBuf], header_row: Option<usize>) -> Vec<TrialTable> {
    inputs
        .iter()
        .filter_map(|path| match loader::load_trial_table(path, header_row) {
            Ok(table) => {
                log::info!(
                    "Loaded {} ({} rows, {} columns)",
                    path.display(),
                    table.rows(),
                    table.headers.len()
                );
                Some(table)
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn run_show(composer: &PlotComposer, tables: &[TrialTable], variables: &[String], modes: &[PlotMode], options: TrialOptions) -> Result<()> {
    let mut figures = Vec::new();
    for variable in variables {
        for &mode in modes {
            match export::figure_for(composer, tables, variable, mode, options) {
                Ok(figure) => figures.push(figure),
                Err(e) => log::warn!("Skipping {} {} plot: {}", variable, mode, e),
            }
        }
    }
    if figures.is_empty() {
        bail!("No figures could be composed");
    }
    display::run_preview(figures)
}

fn print_summary(manifest: &manifest::RenderManifest, output: &Path) {
    eprintln!("\nGenerated {} figures in {}:", manifest.figures.len(), output.display());
    for figure in &manifest.figures {
        eprintln!("  • {}", figure.path.display());
    }
    if !manifest.failures.is_empty() {
        eprintln!("\nSkipped {}:", manifest.failures.len());
        for failure in &manifest.failures {
            eprintln!("  • {} ({}): {}", failure.variable, failure.mode, failure.message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let style = load_style(&args)?;
    let inputs = collect_inputs(&args.files)?;
    let tables = load_tables(&inputs, args.header_row);
    if tables.is_empty() {
        bail!("No trial files could be loaded");
    }

    let variables = if args.var.is_empty() {
        loader::common_variables(&tables)
    } else {
        args.var.clone()
    };

    if args.list {
        for variable in &variables {
            println!("{}", variable);
        }
        return Ok(());
    }
    if variables.is_empty() {
        bail!("The trials share no variables to plot");
    }

    let trial_options = TrialOptions {
        sort_labels: args.sort_labels,
        bounds: CycleBounds {
            min_len: args.min_cycle,
            max_len: args.max_cycle,
        },
    };
    let composer = PlotComposer::new(style);
    let modes = args.mode.modes();

    if args.show {
        return run_show(&composer, &tables, &variables, &modes, trial_options);
    }

    eprintln!("Loaded {} trials, plotting {} variables", tables.len(), variables.len());
    let options = ExportOptions {
        output_dir: args.output.clone(),
        format: args.format,
        modes,
        trials: trial_options,
        jobs: args.jobs,
    };
    let manifest = export::export_all(Arc::new(tables), variables, Arc::new(composer), options).await?;
    print_summary(&manifest, &args.output);

    if manifest.figures.is_empty() {
        bail!("No figures were generated");
    }
    Ok(())
}
