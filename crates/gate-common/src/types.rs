//! Core types shared across Gatehouse components.

use serde::{Deserialize, Serialize};

use crate::constants::SLOT_EDGE_DISTANCE;

/// Current wall-clock time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A position in host (page) pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An element bounding rectangle, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Hit test, inclusive on all four edges
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }
}

/// Placement of a target slot along one axis of its container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "from", content = "distance")]
pub enum Anchor {
    /// Offset from the left/top edge
    Start(f64),
    /// Offset from the right/bottom edge
    End(f64),
    /// Centered (the `translate(-50%)` placement)
    Center,
}

impl Anchor {
    /// Resolve the leading coordinate of a span of `size` inside `[start, start + extent]`
    fn resolve(self, start: f64, extent: f64, size: f64) -> f64 {
        match self {
            Self::Start(distance) => start + distance,
            Self::End(distance) => start + extent - distance - size,
            Self::Center => start + (extent - size) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotAnchor {
    pub horizontal: Anchor,
    pub vertical: Anchor,
}

/// One of the fixed candidate positions of the drop zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSlot {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleRight,
    BottomRight,
    BottomCenter,
    BottomLeft,
}

impl TargetSlot {
    pub const ALL: [TargetSlot; 7] = [
        TargetSlot::TopLeft,
        TargetSlot::TopCenter,
        TargetSlot::TopRight,
        TargetSlot::MiddleRight,
        TargetSlot::BottomRight,
        TargetSlot::BottomCenter,
        TargetSlot::BottomLeft,
    ];

    /// Slot used on first render and after every reset
    pub const DEFAULT: TargetSlot = TargetSlot::MiddleRight;

    pub fn anchor(&self) -> SlotAnchor {
        let d = SLOT_EDGE_DISTANCE;
        let (horizontal, vertical) = match self {
            Self::TopLeft => (Anchor::Start(d), Anchor::Start(d)),
            Self::TopCenter => (Anchor::Center, Anchor::Start(d)),
            Self::TopRight => (Anchor::End(d), Anchor::Start(d)),
            Self::MiddleRight => (Anchor::End(d), Anchor::Center),
            Self::BottomRight => (Anchor::End(d), Anchor::End(d)),
            Self::BottomCenter => (Anchor::Center, Anchor::End(d)),
            Self::BottomLeft => (Anchor::Start(d), Anchor::End(d)),
        };
        SlotAnchor {
            horizontal,
            vertical,
        }
    }

    /// Target zone rectangle for this slot inside `container`
    pub fn resolve(&self, container: Rect, target: Size) -> Rect {
        let anchor = self.anchor();
        Rect {
            left: anchor
                .horizontal
                .resolve(container.left, container.width, target.width),
            top: anchor
                .vertical
                .resolve(container.top, container.height, target.height),
            width: target.width,
            height: target.height,
        }
    }
}

impl Default for TargetSlot {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Feedback text shown under the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    #[default]
    None,
    Success,
    Retry,
}

impl Feedback {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Success => Some("Verification passed"),
            Self::Retry => Some("Missed the target, please try again"),
        }
    }
}

/// Result of the drag challenge, owned by the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Set only by a successful drop, cleared only by reset
    pub verified: bool,

    /// Misses since the last reset
    pub attempts_since_reset: u32,

    pub feedback: Feedback,
}

/// Failed-login bookkeeping, owned by the attempt gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginAttemptRecord {
    /// Consecutive failed logins; reset only by a successful login
    pub failure_count: u32,

    /// Lockout expiry (Unix epoch milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_expires_at: Option<i64>,
}

impl LoginAttemptRecord {
    /// Check whether the lockout window is open at `now_ms`
    pub fn is_locked(&self, now_ms: i64) -> bool {
        matches!(self.lockout_expires_at, Some(expires) if now_ms < expires)
    }

    /// Milliseconds left in the lockout window, if it is open
    pub fn remaining_lockout_ms(&self, now_ms: i64) -> Option<i64> {
        self.lockout_expires_at
            .filter(|expires| now_ms < *expires)
            .map(|expires| expires - now_ms)
    }

    /// Drop an expired lockout timestamp. Returns true if one was cleared.
    pub fn clear_expired(&mut self, now_ms: i64) -> bool {
        match self.lockout_expires_at {
            Some(expires) if now_ms >= expires => {
                self.lockout_expires_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.lockout_expires_at = None;
    }

    /// Fold in another copy of the same client's record, keeping the
    /// higher count and the later lockout
    pub fn merge(&mut self, other: &Self) {
        self.failure_count = self.failure_count.max(other.failure_count);
        self.lockout_expires_at = self.lockout_expires_at.max(other.lockout_expires_at);
    }
}

/// Whole minutes, rounded up
pub fn ceil_minutes(ms: i64) -> u64 {
    if ms <= 0 {
        return 0;
    }
    (ms as u64).div_ceil(60_000)
}
