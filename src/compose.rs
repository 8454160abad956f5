//! Turns a variable's trials into a styled [`Figure`].

use crate::error::ComposeError;
use crate::figure::{
    Curve, Figure, Grid, Legend, LegendCorner, LegendEntry, PlotMode, ShadedBand, Shadow,
    TextStyle, Trial, Typography,
};
use crate::style::StyleConfig;
use std::ops::Range;

/// Normalized figures always span the full cycle
const CYCLE_RANGE: Range<f64> = 0.0..100.0;

/// Fraction of the data extent added above and below the curves
const Y_PADDING: f64 = 0.05;

/// Builds figures from trials using one fixed style
#[derive(Debug, Clone)]
pub struct PlotComposer {
    style: StyleConfig,
}

impl PlotComposer {
    pub fn new(style: StyleConfig) -> Self {
        Self { style }
    }

    /// Compose one figure overlaying every trial for `variable`.
    ///
    /// Trials keep the order they are given in, both for palette assignment
    /// and in the legend.
    pub fn compose(&self, variable: &str, trials: &[Trial], mode: PlotMode) -> Result<Figure, ComposeError> {
        if trials.is_empty() {
            return Err(ComposeError::EmptyInput {
                variable: variable.to_string(),
            });
        }
        for trial in trials {
            check_series(trial)?;
        }

        let style = &self.style;
        let curves: Vec<Curve> = trials
            .iter()
            .enumerate()
            .map(|(i, trial)| self.curve_for(i, trial))
            .collect();

        let legend = Legend {
            corner: LegendCorner::UpperRight,
            entries: curves
                .iter()
                .map(|c| LegendEntry {
                    label: c.label.clone(),
                    color: c.color,
                    line_width_pt: c.line_width_pt,
                })
                .collect(),
            font_pt: style.legend_pt(),
            frame_alpha: style.legend_frame_alpha,
            corner_radius_pt: style.legend_corner_pt,
            shadow: Some(Shadow {
                offset_pt: style.legend_shadow_offset_pt,
                alpha: style.legend_shadow_alpha,
            }),
            inset_pt: style.legend_inset_pt,
            handle_pt: style.legend_handle_pt,
        };

        let x_range = match mode {
            PlotMode::Normalized => CYCLE_RANGE,
            PlotMode::Raw => {
                let longest = trials.iter().map(|t| t.series.len()).max().unwrap_or(1);
                0.0..((longest.saturating_sub(1)).max(1) as f64)
            }
        };
        let y_range = value_range(&curves);

        Ok(Figure {
            title: variable.to_string(),
            x_title: mode.x_axis_title().to_string(),
            y_title: "Value".to_string(),
            mode,
            x_range,
            y_range,
            x_ticks: style.x_ticks,
            y_ticks: style.y_ticks,
            curves,
            legend,
            grid: Grid {
                dashed: true,
                dash_pt: style.grid_dash_pt,
                gap_pt: style.grid_gap_pt,
                width_pt: style.grid_width_pt,
                alpha: style.grid_alpha,
            },
            typography: Typography {
                family: style.font_family.clone(),
                title: TextStyle {
                    size_pt: style.title_pt,
                    bold: true,
                },
                axis_label: TextStyle {
                    size_pt: style.axis_label_pt,
                    bold: true,
                },
                tick: TextStyle {
                    size_pt: style.tick_pt,
                    bold: false,
                },
            },
            canvas: style.canvas(),
        })
    }

    fn curve_for(&self, index: usize, trial: &Trial) -> Curve {
        let points = trial.series.points.clone();
        let band = trial.series.band.as_ref().map(|band| ShadedBand {
            upper: points.iter().zip(&band.upper).map(|((x, _), u)| (*x, *u)).collect(),
            lower: points.iter().zip(&band.lower).map(|((x, _), l)| (*x, *l)).collect(),
            alpha: self.style.band_alpha,
        });

        Curve {
            label: trial.label.clone(),
            color: self.style.color_for(index),
            line_width_pt: self.style.line_width_pt,
            points,
            band,
        }
    }
}

fn check_series(trial: &Trial) -> Result<(), ComposeError> {
    let inconsistent = |reason: String| ComposeError::InconsistentSeries {
        label: trial.label.clone(),
        reason,
    };

    if trial.series.is_empty() {
        return Err(inconsistent("series has no samples".to_string()));
    }
    if let Some(band) = &trial.series.band {
        let n = trial.series.len();
        if band.lower.len() != n || band.upper.len() != n {
            return Err(inconsistent(format!(
                "band has {}/{} bounds for {} samples",
                band.lower.len(),
                band.upper.len(),
                n
            )));
        }
    }
    Ok(())
}

/// Padded y extent over every finite curve and band value
fn value_range(curves: &[Curve]) -> Range<f64> {
    let values = curves.iter().flat_map(|c| {
        let band_values = c
            .band
            .iter()
            .flat_map(|b| b.upper.iter().chain(b.lower.iter()).map(|p| p.1));
        c.points.iter().map(|p| p.1).chain(band_values)
    });

    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() {
        return 0.0..1.0;
    }
    let span = max - min;
    if span <= f64::EPSILON * max.abs().max(1.0) {
        return (min - 1.0)..(max + 1.0);
    }
    (min - span * Y_PADDING)..(max + span * Y_PADDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::{Band, Series};

    fn composer() -> PlotComposer {
        PlotComposer::new(StyleConfig::default())
    }

    fn trial(name: &str, samples: &[f64]) -> Trial {
        Trial::from_file(name, Series::from_samples(samples))
    }

    #[test]
    fn test_empty_trials_rejected_for_every_mode() {
        for mode in [PlotMode::Normalized, PlotMode::Raw] {
            for variable in ["knee_r", "", "hip angle"] {
                let err = composer().compose(variable, &[], mode).unwrap_err();
                assert_eq!(
                    err,
                    ComposeError::EmptyInput {
                        variable: variable.to_string()
                    }
                );
            }
        }
    }

    #[test]
    fn test_empty_series_rejected() {
        let trials = vec![trial("0.2.csv", &[])];
        let err = composer().compose("knee_r", &trials, PlotMode::Raw).unwrap_err();
        assert!(matches!(err, ComposeError::InconsistentSeries { ref label, .. } if label == "20%"));
    }

    #[test]
    fn test_empty_series_among_valid_ones_rejected() {
        let trials = vec![trial("0.2.csv", &[1.0, 2.0]), trial("0.4.csv", &[])];
        assert!(matches!(
            composer().compose("knee_r", &trials, PlotMode::Raw),
            Err(ComposeError::InconsistentSeries { .. })
        ));
    }

    #[test]
    fn test_mismatched_band_rejected() {
        let series = Series::from_samples(&[1.0, 2.0, 3.0]).with_band(Band {
            lower: vec![0.0],
            upper: vec![2.0],
        });
        let trials = vec![Trial::from_file("normal.csv", series)];
        assert!(matches!(
            composer().compose("knee_r", &trials, PlotMode::Raw),
            Err(ComposeError::InconsistentSeries { .. })
        ));
    }

    #[test]
    fn test_titles() {
        let trials = vec![trial("0.2.csv", &[1.0, 2.0])];
        let normalized = composer().compose("knee_angle_r", &trials, PlotMode::Normalized).unwrap();
        assert_eq!(normalized.title, "knee_angle_r");
        assert_eq!(normalized.x_title, "Gait Cycle (%)");
        assert_eq!(normalized.y_title, "Value");

        let raw = composer().compose("knee_angle_r", &trials, PlotMode::Raw).unwrap();
        assert_eq!(raw.title, "knee_angle_r");
        assert_eq!(raw.x_title, "Frame/Index");
    }

    #[test]
    fn test_legend_matches_input_order() {
        let trials = vec![
            trial("1.0.csv", &[1.0]),
            trial("normal.csv", &[2.0]),
            trial("0.2.csv", &[3.0]),
        ];
        let figure = composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        assert_eq!(figure.legend.entries.len(), trials.len());
        assert_eq!(figure.legend_labels(), vec!["100%", "normal", "20%"]);
        assert_eq!(figure.legend.corner, LegendCorner::UpperRight);
    }

    #[test]
    fn test_palette_assigned_in_order_and_wraps() {
        let style = StyleConfig::default();
        let n = style.palette.len();
        let trials: Vec<Trial> = (0..=n).map(|i| trial(&format!("t{}.csv", i), &[1.0])).collect();
        let figure = composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        assert_eq!(figure.curves[0].color, style.palette[0]);
        assert_eq!(figure.curves[1].color, style.palette[1]);
        assert_eq!(figure.curves[n].color, style.palette[0]);
    }

    #[test]
    fn test_style_carried_into_figure() {
        let trials = vec![trial("0.2.csv", &[1.0, 2.0])];
        let figure = composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        assert_eq!(figure.curves[0].line_width_pt, 2.5);
        assert!(figure.grid.dashed);
        assert!(figure.typography.title.bold && figure.typography.axis_label.bold);
        assert!(figure.typography.title.size_pt > figure.typography.axis_label.size_pt);
        assert!(figure.typography.axis_label.size_pt > figure.typography.tick.size_pt);
        assert!(figure.legend.font_pt < figure.typography.axis_label.size_pt);
        assert!(figure.legend.shadow.is_some());
        assert!(figure.legend.corner_radius_pt > 0.0);
    }

    #[test]
    fn test_band_carried_at_band_alpha() {
        let series = Series::from_samples(&[1.0, 2.0]).with_band(Band {
            lower: vec![0.0, 1.0],
            upper: vec![2.0, 3.0],
        });
        let trials = vec![Trial::from_file("0.2.csv", series)];
        let figure = composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        let band = figure.curves[0].band.as_ref().unwrap();
        assert_eq!(band.alpha, 0.15);
        assert_eq!(band.upper, vec![(0.0, 2.0), (1.0, 3.0)]);
        assert!(figure.y_range.start < 0.0 && figure.y_range.end > 3.0);
    }

    #[test]
    fn test_x_range_per_mode() {
        let trials = vec![trial("a.csv", &[1.0, 2.0, 3.0]), trial("b.csv", &[1.0; 50])];
        let raw = composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        assert_eq!(raw.x_range, 0.0..49.0);

        let normalized = composer().compose("hip", &trials, PlotMode::Normalized).unwrap();
        assert_eq!(normalized.x_range, 0.0..100.0);
    }

    #[test]
    fn test_flat_and_missing_values_still_give_a_range() {
        let flat = vec![trial("a.csv", &[5.0, 5.0])];
        let figure = composer().compose("hip", &flat, PlotMode::Raw).unwrap();
        assert_eq!(figure.y_range, 4.0..6.0);

        let missing = vec![trial("a.csv", &[f64::NAN])];
        let figure = composer().compose("hip", &missing, PlotMode::Raw).unwrap();
        assert_eq!(figure.y_range, 0.0..1.0);
        assert_eq!(figure.x_range, 0.0..1.0);
    }

    #[test]
    fn test_compose_leaves_trials_untouched() {
        let trials = vec![trial("0.2.csv", &[1.0, 2.0])];
        let before = trials.clone();
        composer().compose("hip", &trials, PlotMode::Raw).unwrap();
        assert_eq!(trials, before);
    }
}
