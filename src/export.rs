//! Turns loaded tables into figures: per-variable trial assembly and batch export.

use crate::compose::PlotComposer;
use crate::error::ComposeError;
use crate::figure::{sort_trials_by_label, Figure, PlotMode, Trial};
use crate::gait::{normalized_series, raw_series, CycleBounds, Side, RESAMPLE_POINTS, SD_RANGE};
use crate::loader::TrialTable;
use crate::manifest::{RenderFailure, RenderManifest, RenderedFigure};
use crate::plot::{self, OutputFormat};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// How trials are assembled from tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialOptions {
    /// Order trials by label value instead of input order
    pub sort_labels: bool,
    pub bounds: CycleBounds,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub modes: Vec<PlotMode>,
    pub trials: TrialOptions,
    /// Figures rendered concurrently
    pub jobs: usize,
}

/// Collect one trial per table that can contribute to `variable` in `mode`.
///
/// Normalized mode needs the leg's state column and at least one complete
/// gait cycle; tables without them are skipped.
pub fn build_trials(tables: &[TrialTable], variable: &str, mode: PlotMode, options: TrialOptions) -> Vec<Trial> {
    let side = Side::for_variable(variable);
    if mode == PlotMode::Normalized && side.is_none() {
        log::info!("{}: no leg side in name, skipping normalized plot", variable);
        return Vec::new();
    }

    let mut trials = Vec::new();
    for table in tables {
        let Some(data) = table.column(variable) else {
            log::debug!("{}: no column '{}'", table.filename, variable);
            continue;
        };

        let series = match (mode, side) {
            (PlotMode::Normalized, Some(side)) => {
                let Some(states) = table.column(side.state_column()) else {
                    log::debug!("{}: no state column '{}'", table.filename, side.state_column());
                    continue;
                };
                match normalized_series(data, states, options.bounds, RESAMPLE_POINTS, SD_RANGE) {
                    Some(series) => series,
                    None => {
                        log::info!("{}: no complete gait cycles for {}", table.filename, variable);
                        continue;
                    }
                }
            }
            _ => raw_series(data, SD_RANGE),
        };
        trials.push(Trial::from_file(&table.filename, series));
    }

    if options.sort_labels {
        sort_trials_by_label(&mut trials);
    }
    trials
}

/// Assemble trials and compose the figure for one variable and mode
pub fn figure_for(
    composer: &PlotComposer,
    tables: &[TrialTable],
    variable: &str,
    mode: PlotMode,
    options: TrialOptions,
) -> Result<Figure, ComposeError> {
    let trials = build_trials(tables, variable, mode, options);
    composer.compose(variable, &trials, mode)
}

fn render_job(
    composer: &PlotComposer,
    tables: &[TrialTable],
    variable: &str,
    mode: PlotMode,
    options: &ExportOptions,
    path: &Path,
) -> Result<Vec<String>> {
    let figure = figure_for(composer, tables, variable, mode, options.trials)?;
    plot::render(&figure, path, options.format)?;
    Ok(figure.legend_labels().into_iter().map(str::to_string).collect())
}

type RenderHandle = (String, PlotMode, PathBuf, JoinHandle<Result<Vec<String>>>);

/// Await every job and record its outcome; a panicked job counts as a failure
async fn collect_jobs(handles: Vec<RenderHandle>, manifest: &mut RenderManifest) {
    for (variable, mode, path, handle) in handles {
        let outcome = handle
            .await
            .unwrap_or_else(|e| Err(anyhow!("render job failed: {}", e)));
        match outcome {
            Ok(labels) => {
                log::info!("Wrote {} ({} trials)", path.display(), labels.len());
                manifest.figures.push(RenderedFigure {
                    variable,
                    mode,
                    path,
                    labels,
                });
            }
            Err(e) => {
                log::warn!("Skipped {} {} plot: {:#}", variable, mode, e);
                manifest.failures.push(RenderFailure {
                    variable,
                    mode,
                    message: format!("{:#}", e),
                });
            }
        }
    }
}

/// Render every (variable, mode) pair and write the run manifest.
///
/// A failing figure is recorded in the manifest and does not stop the others.
pub async fn export_all(
    tables: Arc<Vec<TrialTable>>,
    variables: Vec<String>,
    composer: Arc<PlotComposer>,
    options: ExportOptions,
) -> Result<RenderManifest> {
    std::fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", options.output_dir.display()))?;

    let options = Arc::new(options);
    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let mut handles = Vec::new();

    for variable in variables {
        for &mode in &options.modes {
            let permit = semaphore.clone().acquire_owned().await?;
            let tables = Arc::clone(&tables);
            let composer = Arc::clone(&composer);
            let options = Arc::clone(&options);
            let job_variable = variable.clone();
            let path = options
                .output_dir
                .join(plot::output_file_name(&variable, mode, options.format));

            let job_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                render_job(&composer, &tables, &job_variable, mode, &options, &job_path)
            });
            handles.push((variable.clone(), mode, path, handle));
        }
    }

    let inputs = tables.iter().map(|t| t.path.clone()).collect();
    let mut manifest = RenderManifest::new(inputs);
    collect_jobs(handles, &mut manifest).await;

    manifest.sort();
    let manifest_path = manifest.write(&options.output_dir)?;
    log::debug!("Manifest written to {}", manifest_path.display());
    Ok(manifest)
}
