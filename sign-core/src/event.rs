//! Input events for overlay interaction.
//!
//! Mouse and touch input are unified into [`PointerEvent`]s carrying client
//! coordinates (pixels relative to the viewer container's top-left corner).

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button pressed or finger down.
    Down,
    /// Pointer moved.
    Move,
    /// Button released or finger lifted.
    Up,
    /// Gesture cancelled by the platform.
    Cancel,
}

/// What produced a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerSource {
    /// Mouse or trackpad cursor.
    #[default]
    Mouse,
    /// Touch screen.
    Touch,
}

/// A single touch contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Touch identifier (for multi-touch).
    pub id: u32,
    /// X position in client coordinates.
    pub x: f64,
    /// Y position in client coordinates.
    pub y: f64,
}

impl TouchPoint {
    /// Position as a point.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A pointer event in client coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// Input device.
    #[serde(default)]
    pub source: PointerSource,
    /// Client X.
    pub x: f64,
    /// Client Y.
    pub y: f64,
    /// Number of active contacts (1 for mouse).
    #[serde(default = "default_contacts")]
    pub contacts: u32,
}

fn default_contacts() -> u32 {
    1
}

impl PointerEvent {
    /// Create a mouse event.
    #[must_use]
    pub fn mouse(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self {
            phase,
            source: PointerSource::Mouse,
            x,
            y,
            contacts: 1,
        }
    }

    /// Create a pointer event from touch contacts.
    ///
    /// The primary (first) contact supplies the position. For `Up`, pass the
    /// contacts that changed, since none remain active.
    #[must_use]
    pub fn touch(phase: PointerPhase, touches: &[TouchPoint]) -> Option<Self> {
        let primary = touches.first()?;
        Some(Self {
            phase,
            source: PointerSource::Touch,
            x: primary.x,
            y: primary.y,
            contacts: u32::try_from(touches.len()).unwrap_or(u32::MAX),
        })
    }

    /// Client position.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Whether more than one contact is active.
    #[must_use]
    pub fn is_multi_touch(&self) -> bool {
        self.contacts > 1
    }
}

/// Raw input for the zoom recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ZoomInput {
    /// Wheel notch; trackpad pinch arrives as wheel with `ctrl` held.
    Wheel {
        /// Vertical delta; positive scrolls down (zoom out).
        delta_y: f64,
        /// Whether the control modifier was held.
        ctrl: bool,
    },
    /// Touch contacts began.
    TouchStart {
        /// Active contacts.
        touches: Vec<TouchPoint>,
    },
    /// Touch contacts moved.
    TouchMove {
        /// Active contacts.
        touches: Vec<TouchPoint>,
    },
    /// Touch contacts ended; `remaining` is what is still down.
    TouchEnd {
        /// Contacts still active.
        remaining: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_uses_primary_contact() {
        let event = PointerEvent::touch(
            PointerPhase::Down,
            &[
                TouchPoint {
                    id: 0,
                    x: 10.0,
                    y: 20.0,
                },
                TouchPoint {
                    id: 1,
                    x: 50.0,
                    y: 60.0,
                },
            ],
        )
        .expect("has a contact");
        assert_eq!(event.position(), Point::new(10.0, 20.0));
        assert!(event.is_multi_touch());
    }

    #[test]
    fn test_touch_without_contacts() {
        assert!(PointerEvent::touch(PointerPhase::Move, &[]).is_none());
    }

    #[test]
    fn test_mouse_and_touch_share_shape() {
        let mouse = PointerEvent::mouse(PointerPhase::Down, 5.0, 6.0);
        let touch = PointerEvent::touch(
            PointerPhase::Down,
            &[TouchPoint {
                id: 3,
                x: 5.0,
                y: 6.0,
            }],
        )
        .expect("has a contact");
        assert_eq!(mouse.position(), touch.position());
        assert!(!touch.is_multi_touch());
    }
}
