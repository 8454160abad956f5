//! Figure styling: canvas, type scale, palette and decoration settings.
//!
//! One immutable [`StyleConfig`] is handed to the composer; nothing here is
//! global or mutable.

use crate::error::StyleError;
use crate::figure::Canvas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An sRGB color, serialized as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Qualitative palette (ColorBrewer Set1 without its yellow, which washes out on white)
pub const QUALITATIVE_PALETTE: [Rgb; 8] = [
    Rgb(228, 26, 28),
    Rgb(55, 126, 184),
    Rgb(77, 175, 74),
    Rgb(152, 78, 163),
    Rgb(255, 127, 0),
    Rgb(166, 86, 40),
    Rgb(247, 129, 191),
    Rgb(153, 153, 153),
];

/// Complete style for one figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Figure width in inches
    pub width_in: f64,
    /// Figure height in inches
    pub height_in: f64,
    /// Export resolution
    pub dpi: u32,
    /// Margin kept around the tight bounding box, in inches
    pub pad_in: f64,

    pub font_family: String,
    pub title_pt: f64,
    pub axis_label_pt: f64,
    pub tick_pt: f64,
    /// Legend text is this much smaller than axis labels
    pub font_step_pt: f64,

    pub line_width_pt: f64,
    /// Opacity of confidence bands
    pub band_alpha: f64,
    pub palette: Vec<Rgb>,

    pub grid_alpha: f64,
    pub grid_width_pt: f64,
    pub grid_dash_pt: f64,
    pub grid_gap_pt: f64,
    pub x_ticks: usize,
    pub y_ticks: usize,

    /// Opacity of the legend background fill
    pub legend_frame_alpha: f64,
    pub legend_corner_pt: f64,
    pub legend_shadow_offset_pt: f64,
    pub legend_shadow_alpha: f64,
    /// Gap between the legend and the plot area corner
    pub legend_inset_pt: f64,
    /// Length of the line sample drawn next to each legend label
    pub legend_handle_pt: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            width_in: 10.0,
            height_in: 6.0,
            dpi: 300,
            pad_in: 0.1,
            font_family: "sans-serif".to_string(),
            title_pt: 18.0,
            axis_label_pt: 16.0,
            tick_pt: 14.0,
            font_step_pt: 2.0,
            line_width_pt: 2.5,
            band_alpha: 0.15,
            palette: QUALITATIVE_PALETTE.to_vec(),
            grid_alpha: 0.3,
            grid_width_pt: 0.8,
            grid_dash_pt: 4.0,
            grid_gap_pt: 3.0,
            x_ticks: 11,
            y_ticks: 8,
            legend_frame_alpha: 0.9,
            legend_corner_pt: 4.0,
            legend_shadow_offset_pt: 2.5,
            legend_shadow_alpha: 0.25,
            legend_inset_pt: 8.0,
            legend_handle_pt: 24.0,
        }
    }
}

impl StyleConfig {
    /// Load a style file; keys missing from the file keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StyleError> {
        let text = fs::read_to_string(path.as_ref())?;
        let style: StyleConfig = serde_json::from_str(&text)?;
        style.validate()?;
        Ok(style)
    }

    /// Check sizes are positive and the type hierarchy holds
    pub fn validate(&self) -> Result<(), StyleError> {
        if self.width_in <= 0.0 || self.height_in <= 0.0 {
            return Err(StyleError::Invalid("figure size must be positive".into()));
        }
        if self.dpi == 0 {
            return Err(StyleError::Invalid("dpi must be positive".into()));
        }
        if self.palette.is_empty() {
            return Err(StyleError::Invalid("palette must contain at least one color".into()));
        }
        if !(self.title_pt > self.axis_label_pt && self.axis_label_pt > self.tick_pt) {
            return Err(StyleError::Invalid(format!(
                "font sizes must decrease title > axis labels > ticks (got {} / {} / {})",
                self.title_pt, self.axis_label_pt, self.tick_pt
            )));
        }
        if self.tick_pt <= 0.0 || self.legend_pt() <= 0.0 {
            return Err(StyleError::Invalid("tick and legend fonts must be positive".into()));
        }
        for (name, alpha) in [
            ("band_alpha", self.band_alpha),
            ("grid_alpha", self.grid_alpha),
            ("legend_frame_alpha", self.legend_frame_alpha),
            ("legend_shadow_alpha", self.legend_shadow_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(StyleError::Invalid(format!("{} must lie in [0, 1], got {}", name, alpha)));
            }
        }
        if !self.pad_in.is_finite() || self.pad_in < 0.0 {
            return Err(StyleError::Invalid(format!("pad_in must be finite and non-negative, got {}", self.pad_in)));
        }
        if self.line_width_pt <= 0.0 {
            return Err(StyleError::Invalid("line width must be positive".into()));
        }
        Ok(())
    }

    pub fn legend_pt(&self) -> f64 {
        self.axis_label_pt - self.font_step_pt
    }

    /// Palette color for the trial at `index`, wrapping around
    pub fn color_for(&self, index: usize) -> Rgb {
        self.palette[index % self.palette.len()]
    }

    /// Physical output size at the configured resolution
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width_in: self.width_in,
            height_in: self.height_in,
            dpi: self.dpi,
            pad_in: self.pad_in,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let style = StyleConfig::default();
        assert!(style.validate().is_ok());
        assert_eq!(style.canvas().size_px(), (3000, 1800));
        assert!(style.legend_pt() < style.axis_label_pt);
        assert!(style.title_pt > style.axis_label_pt);
    }

    #[test]
    fn test_palette_wraps() {
        let style = StyleConfig::default();
        let n = style.palette.len();
        assert_eq!(style.color_for(0), style.color_for(n));
        assert_ne!(style.color_for(0), style.color_for(1));
    }

    #[test]
    fn test_px_conversion() {
        let canvas = StyleConfig::default().with_dpi(72).canvas();
        assert_eq!(canvas.px(10.0), 10.0);
        assert_eq!(canvas.pad_px(), 7);
        let canvas = StyleConfig::default().with_dpi(144).canvas();
        assert_eq!(canvas.px(2.5), 5.0);
        assert_eq!(canvas.size_px(), (1440, 864));
    }

    #[test]
    fn test_rejects_inverted_type_scale() {
        let style = StyleConfig {
            title_pt: 10.0,
            ..Default::default()
        };
        assert!(matches!(style.validate(), Err(StyleError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let style = StyleConfig {
            band_alpha: 1.5,
            ..Default::default()
        };
        assert!(style.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_padding() {
        for pad_in in [-0.1, f64::NAN, f64::INFINITY] {
            let style = StyleConfig {
                pad_in,
                ..Default::default()
            };
            assert!(matches!(style.validate(), Err(StyleError::Invalid(_))), "pad_in {}", pad_in);
        }
        let flush = StyleConfig {
            pad_in: 0.0,
            ..Default::default()
        };
        assert!(flush.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dpi": 150, "palette": [[0, 0, 0], [255, 0, 0]] }}"#).unwrap();

        let style = StyleConfig::load(file.path()).unwrap();
        assert_eq!(style.dpi, 150);
        assert_eq!(style.palette, vec![Rgb(0, 0, 0), Rgb(255, 0, 0)]);
        assert_eq!(style.line_width_pt, 2.5);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(StyleConfig::load(file.path()), Err(StyleError::Parse(_))));
    }
}
