//! Gait cycle detection and per-trial series construction.
//!
//! A trial's state column encodes the gait phase of each frame. Heel strikes
//! (Landing -> EarlyStance) split the recording into cycles, every cycle is
//! resampled onto a 0-100% grid, and the cycles are averaged into one mean
//! curve with a standard-deviation band.

use crate::figure::{Band, Series};

/// Points per resampled cycle (0%, 1%, ... 100%)
pub const RESAMPLE_POINTS: usize = 101;

/// Width of confidence bands in standard deviations
pub const SD_RANGE: f64 = 2.0;

/// Leg a variable belongs to, which selects its state column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Right,
    Left,
}

impl Side {
    /// Guess the side from a variable name (`knee_r`, `hip_left`, ...)
    pub fn for_variable(name: &str) -> Option<Side> {
        let lower = name.to_lowercase();
        if lower.contains("_r") || lower.contains("right") {
            Some(Side::Right)
        } else if lower.contains("_l") || lower.contains("left") {
            Some(Side::Left)
        } else {
            None
        }
    }

    /// Column holding the gait phase for this leg
    pub fn state_column(self) -> &'static str {
        match self {
            Side::Right => "leg1_r.state",
            Side::Left => "leg0_l.state",
        }
    }
}

/// Gait phase as recorded in the state column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaitPhase {
    EarlyStance = 0,
    LateStance = 1,
    Liftoff = 2,
    Swing = 3,
    Landing = 4,
}

impl GaitPhase {
    /// Phase for a raw state value, rounded to the nearest code
    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        match value.round() as i64 {
            0 => Some(GaitPhase::EarlyStance),
            1 => Some(GaitPhase::LateStance),
            2 => Some(GaitPhase::Liftoff),
            3 => Some(GaitPhase::Swing),
            4 => Some(GaitPhase::Landing),
            _ => None,
        }
    }
}

/// Accepted distance between consecutive heel strikes, in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for CycleBounds {
    fn default() -> Self {
        Self {
            min_len: 10,
            max_len: 1000,
        }
    }
}

/// Decode a state column, skipping missing frames.
///
/// Returns `None` when a present value is not a known phase or the column
/// never changes phase.
fn decode_states(states: &[f64]) -> Option<Vec<(usize, GaitPhase)>> {
    let mut decoded = Vec::with_capacity(states.len());
    for (i, &value) in states.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        decoded.push((i, GaitPhase::from_value(value)?));
    }

    let first = decoded.first()?.1;
    decoded.iter().any(|(_, p)| *p != first).then_some(decoded)
}

/// Frame indices of accepted heel strikes.
///
/// A strike is accepted when it lies within `bounds` of the previous accepted
/// strike (the first is measured from frame 0). Fewer than two strikes means
/// no complete cycle, so the result is empty.
pub fn find_gait_cycles(states: &[f64], bounds: CycleBounds) -> Vec<usize> {
    let Some(decoded) = decode_states(states) else {
        log::debug!("State column has no usable phase changes");
        return Vec::new();
    };

    let mut strikes = Vec::new();
    let mut last_strike = 0;
    for pair in decoded.windows(2) {
        let (_, prev) = pair[0];
        let (i, current) = pair[1];
        if prev != GaitPhase::Landing || current != GaitPhase::EarlyStance {
            continue;
        }

        let length = i - last_strike;
        if (bounds.min_len..=bounds.max_len).contains(&length) {
            strikes.push(i);
            last_strike = i;
        } else {
            log::debug!(
                "Ignoring gait cycle of {} frames at frame {} (accepted {}..={})",
                length,
                i,
                bounds.min_len,
                bounds.max_len
            );
        }
    }

    if strikes.len() < 2 {
        return Vec::new();
    }
    strikes
}

/// Resample `data[start..=end]` onto `n_points` evenly spaced positions.
///
/// Only finite samples take part in the interpolation; positions outside the
/// first/last finite sample take the nearest finite value.
pub fn resample_cycle(data: &[f64], start: usize, end: usize, n_points: usize) -> Option<Vec<f64>> {
    if start >= end || end >= data.len() || n_points == 0 {
        return None;
    }

    let segment = &data[start..=end];
    let known: Vec<(f64, f64)> = segment
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i as f64, *v))
        .collect();
    if known.len() < 2 {
        return None;
    }

    let last = (segment.len() - 1) as f64;
    let step = if n_points > 1 { last / (n_points - 1) as f64 } else { 0.0 };
    Some((0..n_points).map(|k| interpolate(&known, k as f64 * step)).collect())
}

/// Piecewise-linear interpolation over points sorted by x, clamped at the ends
fn interpolate(known: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = (known[0], known[known.len() - 1]);
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    let upper = known.partition_point(|p| p.0 < x);
    let (x0, y0) = known[upper - 1];
    let (x1, y1) = known[upper];
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Population mean and standard deviation of the finite values
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Mean gait cycle of one trial on a 0-100% axis, with a ±`sd_range` SD band.
///
/// Returns `None` when the state column yields no complete cycle.
pub fn normalized_series(
    data: &[f64],
    states: &[f64],
    bounds: CycleBounds,
    n_points: usize,
    sd_range: f64,
) -> Option<Series> {
    let strikes = find_gait_cycles(states, bounds);
    let cycles: Vec<Vec<f64>> = strikes
        .windows(2)
        .filter_map(|w| resample_cycle(data, w[0], w[1], n_points))
        .collect();
    if cycles.is_empty() {
        return None;
    }
    log::debug!("Averaging {} gait cycles", cycles.len());

    let mut mean = Vec::with_capacity(n_points);
    let mut std = Vec::with_capacity(n_points);
    let mut column = Vec::with_capacity(cycles.len());
    for k in 0..n_points {
        column.clear();
        column.extend(cycles.iter().map(|c| c[k]));
        let (m, s) = mean_std(&column).unwrap_or((f64::NAN, f64::NAN));
        mean.push(m);
        std.push(s);
    }

    let last = (n_points.max(2) - 1) as f64;
    let points = mean
        .iter()
        .enumerate()
        .map(|(k, m)| (k as f64 * 100.0 / last, *m))
        .collect();
    let band = Band::around(&mean, |k| sd_range * std[k]);
    Some(Series::new(points).with_band(band))
}

/// Whole recording indexed by frame, banded by the recording's own spread.
///
/// The band is left out when fewer than two samples are finite.
pub fn raw_series(data: &[f64], sd_range: f64) -> Series {
    let series = Series::from_samples(data);
    let finite = data.iter().filter(|v| v.is_finite()).count();
    match mean_std(data) {
        Some((_, std)) if finite >= 2 => series.with_band(Band::around(data, |_| sd_range * std)),
        _ => series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `cycles` repetitions of a 20-frame phase pattern, led by a short
    /// swing/landing run so the first strike lands at frame 12.
    fn synthetic_states(cycles: usize) -> Vec<f64> {
        let mut states = vec![3.0; 8];
        states.extend([4.0; 4]);
        for _ in 0..cycles {
            states.extend([0.0; 5]);
            states.extend([1.0; 5]);
            states.extend([2.0; 3]);
            states.extend([3.0; 4]);
            states.extend([4.0; 3]);
        }
        states.push(0.0);
        states
    }

    #[test]
    fn test_side_for_variable() {
        assert_eq!(Side::for_variable("knee_angle_r"), Some(Side::Right));
        assert_eq!(Side::for_variable("Hip_Left"), Some(Side::Left));
        assert_eq!(Side::for_variable("ankle_l.moment"), Some(Side::Left));
        assert_eq!(Side::for_variable("pelvis"), None);
        assert_eq!(Side::Right.state_column(), "leg1_r.state");
        assert_eq!(Side::Left.state_column(), "leg0_l.state");
    }

    #[test]
    fn test_phase_from_value() {
        assert_eq!(GaitPhase::from_value(4.0), Some(GaitPhase::Landing));
        assert_eq!(GaitPhase::from_value(0.2), Some(GaitPhase::EarlyStance));
        assert_eq!(GaitPhase::from_value(7.0), None);
        assert_eq!(GaitPhase::from_value(f64::NAN), None);
    }

    #[test]
    fn test_find_cycles_on_regular_gait() {
        let states = synthetic_states(3);
        let strikes = find_gait_cycles(&states, CycleBounds::default());
        assert_eq!(strikes, vec![12, 32, 52, 72]);
    }

    #[test]
    fn test_find_cycles_skips_short_cycles() {
        let mut states = synthetic_states(2);
        // A spurious landing/stance flicker two frames after the first strike
        states[14] = 4.0;
        let strikes = find_gait_cycles(&states, CycleBounds::default());
        assert_eq!(strikes, vec![12, 32, 52]);
    }

    #[test]
    fn test_find_cycles_rejects_invalid_states() {
        let mut states = synthetic_states(3);
        states[20] = 9.0;
        assert!(find_gait_cycles(&states, CycleBounds::default()).is_empty());
        assert!(find_gait_cycles(&[0.0; 50], CycleBounds::default()).is_empty());
        assert!(find_gait_cycles(&[], CycleBounds::default()).is_empty());
    }

    #[test]
    fn test_find_cycles_needs_two_strikes() {
        let mut states = vec![3.0; 5];
        states.extend([4.0; 10]);
        states.extend([0.0; 10]);
        assert!(find_gait_cycles(&states, CycleBounds::default()).is_empty());
    }

    #[test]
    fn test_missing_state_frames_are_skipped() {
        let mut states = synthetic_states(3);
        states[25] = f64::NAN;
        assert_eq!(find_gait_cycles(&states, CycleBounds::default()), vec![12, 32, 52, 72]);
    }

    #[test]
    fn test_resample_linear_ramp() {
        let data: Vec<f64> = (0..11).map(|i| i as f64 * 2.0).collect();
        let resampled = resample_cycle(&data, 0, 10, 21).unwrap();
        assert_eq!(resampled.len(), 21);
        assert_eq!(resampled[0], 0.0);
        assert_eq!(resampled[20], 20.0);
        assert!((resampled[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_interpolates_over_gaps() {
        let data = vec![0.0, f64::NAN, 4.0];
        let resampled = resample_cycle(&data, 0, 2, 3).unwrap();
        assert_eq!(resampled, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_resample_invalid_bounds() {
        let data = vec![1.0; 10];
        assert!(resample_cycle(&data, 5, 5, 101).is_none());
        assert!(resample_cycle(&data, 6, 2, 101).is_none());
        assert!(resample_cycle(&data, 0, 10, 101).is_none());
        assert!(resample_cycle(&[1.0, f64::NAN, f64::NAN], 0, 2, 101).is_none());
    }

    #[test]
    fn test_mean_std_population() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
        assert!(mean_std(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_normalized_series_of_identical_cycles() {
        let states = synthetic_states(3);
        let data: Vec<f64> = (0..states.len()).map(|i| ((i + 8) % 20) as f64).collect();
        let series = normalized_series(&data, &states, CycleBounds::default(), RESAMPLE_POINTS, SD_RANGE).unwrap();

        assert_eq!(series.len(), RESAMPLE_POINTS);
        assert_eq!(series.points[0].0, 0.0);
        assert_eq!(series.points[100].0, 100.0);
        let band = series.band.as_ref().unwrap();
        for (k, (_, mean)) in series.points.iter().enumerate() {
            assert!((band.upper[k] - mean).abs() < 1e-9);
            assert!((band.lower[k] - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalized_series_without_cycles() {
        let data = vec![1.0; 40];
        assert!(normalized_series(&data, &[0.0; 40], CycleBounds::default(), RESAMPLE_POINTS, SD_RANGE).is_none());
    }

    #[test]
    fn test_raw_series_band() {
        let series = raw_series(&[1.0, 3.0], 2.0);
        assert_eq!(series.points, vec![(0.0, 1.0), (1.0, 3.0)]);
        let band = series.band.unwrap();
        assert_eq!(band.lower, vec![-1.0, 1.0]);
        assert_eq!(band.upper, vec![3.0, 5.0]);

        assert!(raw_series(&[1.0], 2.0).band.is_none());
        assert!(raw_series(&[], 2.0).is_empty());
    }
}
