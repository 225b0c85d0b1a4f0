//! Zoom gesture recognition.
//!
//! Turns ctrl+wheel (trackpad pinch arrives this way too) and two-finger
//! touch pinches into requested scales. The recognizer never applies a scale
//! itself; callers feed the result into `set_scale`.

use crate::config::{bounded, ViewerConfig};
use crate::event::{TouchPoint, ZoomInput};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pinch {
    initial_distance: f64,
    initial_scale: f64,
}

/// Stateful zoom recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomGesture {
    min_scale: f64,
    max_scale: f64,
    step: f64,
    pinch: Option<Pinch>,
}

impl ZoomGesture {
    /// Create a recognizer using the configured range and step.
    #[must_use]
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            step: config.zoom_step,
            pinch: None,
        }
    }

    /// Whether a two-finger pinch is being tracked.
    #[must_use]
    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// Feed one input. Returns the scale to apply, if it differs from `current`.
    pub fn handle(&mut self, input: &ZoomInput, current: f64) -> Option<f64> {
        match input {
            ZoomInput::Wheel { delta_y, ctrl } => {
                if !ctrl {
                    return None;
                }
                let delta = if *delta_y > 0.0 { -self.step } else { self.step };
                changed(self.clamp(current + delta), current)
            }
            ZoomInput::TouchStart { touches } => {
                if let Some(distance) = pinch_distance(touches) {
                    self.pinch = Some(Pinch {
                        initial_distance: distance,
                        initial_scale: current,
                    });
                }
                None
            }
            ZoomInput::TouchMove { touches } => {
                let pinch = self.pinch?;
                let distance = pinch_distance(touches)?;
                if pinch.initial_distance <= 0.0 {
                    return None;
                }
                let target = pinch.initial_scale * (distance / pinch.initial_distance);
                changed(self.clamp(target), current)
            }
            ZoomInput::TouchEnd { remaining } => {
                if *remaining < 2 {
                    self.pinch = None;
                }
                None
            }
        }
    }

    fn clamp(&self, scale: f64) -> f64 {
        bounded(scale, self.min_scale, self.max_scale)
    }
}

fn changed(next: f64, current: f64) -> Option<f64> {
    ((next - current).abs() > f64::EPSILON).then_some(next)
}

/// Distance between the first two contacts, when exactly two are down.
fn pinch_distance(touches: &[TouchPoint]) -> Option<f64> {
    match touches {
        [a, b] => Some(a.position().distance_to(b.position())),
        _ => None,
    }
}
