//! Legend label derivation from trial filenames.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DECIMAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)$").expect("Invalid decimal label regex"));
static INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)$").expect("Invalid integer label regex"));
static PERCENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%").expect("Invalid percentage label regex"));

/// Largest bare integer still read as a percentage
const MAX_INTEGER_PERCENT: u64 = 100;

/// Filename patterns, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelRule {
    /// `0.2` -> `20%`, for values in (0, 1]
    DecimalFraction,
    /// `20` -> `20%`
    BareInteger,
    /// `test_20%` -> `20%`
    ExplicitPercent,
}

const RULES: [LabelRule; 3] = [
    LabelRule::DecimalFraction,
    LabelRule::BareInteger,
    LabelRule::ExplicitPercent,
];

impl LabelRule {
    fn apply(self, stem: &str) -> Option<String> {
        match self {
            LabelRule::DecimalFraction => {
                let caps = DECIMAL_PATTERN.captures(stem)?;
                let value: f64 = caps[1].parse().ok()?;
                if value > 0.0 && value <= 1.0 {
                    Some(format_percent(value))
                } else {
                    None
                }
            }
            LabelRule::BareInteger => {
                let caps = INTEGER_PATTERN.captures(stem)?;
                let value: u64 = caps[1].parse().ok()?;
                (value <= MAX_INTEGER_PERCENT).then(|| format!("{}%", value))
            }
            LabelRule::ExplicitPercent => PERCENT_PATTERN
                .find(stem)
                .map(|m| m.as_str().to_string()),
        }
    }
}

/// Format a fraction of one as a whole percentage, e.g. `0.2` -> `"20%"`.
///
/// The product is rounded before formatting so `0.2 * 100.0` never prints
/// as `19.999999999999996`.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", (fraction * 100.0).round() as i64)
}

/// Strip directory components and a trailing extension.
///
/// A suffix only counts as an extension when it contains a non-digit, so a
/// bare `0.2` keeps its decimal part.
pub fn file_stem(filename: &str) -> &str {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => {
            let ext = &name[dot + 1..];
            if !ext.is_empty() && ext.chars().any(|c| !c.is_ascii_digit()) {
                &name[..dot]
            } else {
                name
            }
        }
    }
}

/// Derive the legend label for a trial file.
///
/// Never fails: a name that matches no pattern comes back as its stem, so
/// unrecognised files stay identifiable in the legend.
pub fn extract_label(filename: &str) -> String {
    let stem = file_stem(filename);
    RULES
        .iter()
        .find_map(|rule| rule.apply(stem))
        .unwrap_or_else(|| stem.to_string())
}

/// Numeric value of a percentage label, used for explicit label sorting
pub fn percent_value(label: &str) -> Option<f64> {
    label.strip_suffix('%')?.parse().ok()
}
