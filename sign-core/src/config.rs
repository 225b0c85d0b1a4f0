//! Viewer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SignError, SignResult};

/// How pages are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// All pages in one vertically scrolling flow.
    #[default]
    Scroll,
    /// One page at a time.
    Single,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scroll => f.write_str("scroll"),
            Self::Single => f.write_str("single"),
        }
    }
}

impl std::str::FromStr for ViewMode {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scroll" => Ok(Self::Scroll),
            "single" => Ok(Self::Single),
            other => Err(SignError::InvalidConfig(format!("unknown view mode '{other}'"))),
        }
    }
}

/// Tunables for zoom, rendering, layout and gestures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    /// Smallest allowed scale.
    pub min_scale: f64,
    /// Largest allowed scale.
    pub max_scale: f64,
    /// Scale change per wheel notch.
    pub zoom_step: f64,
    /// Scale used when a strategy is first initialised.
    pub initial_scale: f64,
    /// Quiet period after the last zoom before the full-quality render.
    pub zoom_debounce_ms: u64,
    /// Pixel density multiplier for preview renders.
    pub preview_quality: f64,
    /// Device pixel ratio applied to full-quality renders.
    pub device_pixel_ratio: f64,
    /// Pointer travel (px) before a drag counts as moved.
    pub drag_threshold_px: f64,
    /// Smallest field edge (px) reachable by resizing.
    pub min_resize_px: f64,
    /// Vertical gap between pages in scroll mode.
    pub page_gap_px: f64,
    /// Padding around the page flow.
    pub page_padding_px: f64,
    /// Visible ratio a page needs to become current.
    pub visibility_threshold: f64,
    /// Edge length of resize handles.
    pub handle_size_px: f64,
    /// Edge length of the delete control.
    pub delete_control_size_px: f64,
    /// Mode used when none is requested.
    pub default_view_mode: ViewMode,
    /// Initial viewport width.
    pub viewport_width: f64,
    /// Initial viewport height.
    pub viewport_height: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 5.0,
            zoom_step: 0.1,
            initial_scale: 1.0,
            zoom_debounce_ms: 150,
            preview_quality: 0.5,
            device_pixel_ratio: 1.0,
            drag_threshold_px: 3.0,
            min_resize_px: 20.0,
            page_gap_px: 20.0,
            page_padding_px: 20.0,
            visibility_threshold: 0.5,
            handle_size_px: 10.0,
            delete_control_size_px: 20.0,
            default_view_mode: ViewMode::Scroll,
            viewport_width: 800.0,
            viewport_height: 600.0,
        }
    }
}

impl ViewerConfig {
    /// Clamp a scale into the configured range.
    ///
    /// Never panics, even for a range that fails [`Self::validate`]; the
    /// upper bound wins when the bounds are inverted.
    #[must_use]
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        let scale = if scale.is_nan() {
            self.initial_scale
        } else {
            scale
        };
        bounded(scale, self.min_scale, self.max_scale)
    }

    /// Parse a configuration from JSON; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails [`Self::validate`].
    pub fn from_json(json: &str) -> SignResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> SignResult<()> {
        if !(self.min_scale > 0.0) || !(self.max_scale >= self.min_scale) {
            return Err(SignError::InvalidConfig(format!(
                "scale range [{}, {}] is invalid",
                self.min_scale, self.max_scale
            )));
        }
        let positive = [
            ("zoomStep", self.zoom_step),
            ("initialScale", self.initial_scale),
            ("previewQuality", self.preview_quality),
            ("devicePixelRatio", self.device_pixel_ratio),
            ("minResizePx", self.min_resize_px),
            ("handleSizePx", self.handle_size_px),
            ("deleteControlSizePx", self.delete_control_size_px),
            ("viewportWidth", self.viewport_width),
            ("viewportHeight", self.viewport_height),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| !(*value > 0.0)) {
            return Err(SignError::InvalidConfig(format!(
                "{name} must be positive, got {value}"
            )));
        }
        let non_negative = [
            ("dragThresholdPx", self.drag_threshold_px),
            ("pageGapPx", self.page_gap_px),
            ("pagePaddingPx", self.page_padding_px),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, value)| !(*value >= 0.0)) {
            return Err(SignError::InvalidConfig(format!(
                "{name} must not be negative, got {value}"
            )));
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(SignError::InvalidConfig(format!(
                "visibilityThreshold must be within [0, 1], got {}",
                self.visibility_threshold
            )));
        }
        Ok(())
    }
}

/// `f64::clamp` without its panic on inverted or NaN bounds.
pub(crate) fn bounded(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
