//! Unified pointer input.
//!
//! Mouse and touch are folded into one event stream so the widget runs a
//! single state machine for both.

use gate_common::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
}

/// One pointer transition, in host coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum PointerEvent {
    /// mousedown / touchstart
    Down { x: f64, y: f64 },
    /// mousemove / touchmove
    Move { x: f64, y: f64 },
    /// mouseup / touchend (touchend reports the changed touch)
    Up { x: f64, y: f64 },
    /// Pointer left the component while pressed
    Leave,
    /// touchcancel
    Cancel,
}

impl PointerEvent {
    pub fn position(&self) -> Option<Point> {
        match *self {
            Self::Down { x, y } | Self::Move { x, y } | Self::Up { x, y } => Some(Point::new(x, y)),
            Self::Leave | Self::Cancel => None,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            Self::Down { .. } => "down",
            Self::Move { .. } => "move",
            Self::Up { .. } => "up",
            Self::Leave => "leave",
            Self::Cancel => "cancel",
        }
    }
}

/// Pointer event as forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    #[serde(default)]
    pub kind: PointerKind,
    #[serde(flatten)]
    pub event: PointerEvent,
}

impl PointerInput {
    pub fn mouse(event: PointerEvent) -> Self {
        Self {
            kind: PointerKind::Mouse,
            event,
        }
    }

    pub fn touch(event: PointerEvent) -> Self {
        Self {
            kind: PointerKind::Touch,
            event,
        }
    }
}
