//! Drag-to-target verification widget.
//!
//! The user drags a token along a horizontal track and releases the
//! pointer inside a target zone. The zone sits in one of seven fixed
//! slots; every miss moves it to a different slot and snaps the token
//! back to the start of the track.
//!
//! The widget talks to its parent over two watch channels:
//! - `verified` (child → parent): the current verification outcome
//! - `reset` (parent → child): any change in value re-arms the challenge

use std::time::Duration;

use gate_common::{Feedback, Point, Rect, Size, TargetSlot, VerificationOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::pointer::{PointerEvent, PointerInput};

/// Host geometry the widget is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidgetLayout {
    /// Bounding box of the whole challenge (target slots are relative to it)
    pub container: Rect,
    /// Bounding box of the track the token slides in
    pub track: Rect,
    pub token: Size,
    pub target: Size,
}

impl WidgetLayout {
    /// Largest valid token offset within the track
    pub fn max_offset(&self) -> f64 {
        (self.track.width - self.token.width).max(0.0)
    }
}

impl Default for WidgetLayout {
    fn default() -> Self {
        Self {
            container: Rect::new(0.0, 0.0, 320.0, 180.0),
            track: Rect::new(20.0, 130.0, 280.0, 40.0),
            token: Size::new(40.0, 40.0),
            target: Size::new(60.0, 60.0),
        }
    }
}

/// Transient state while the pointer is held down on the token
#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    /// Pointer x minus token origin at press time
    grab_offset: f64,
}

/// Deferred request to clear the miss styling.
///
/// Only the ticket from the most recent miss has any effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ErrorClear {
    epoch: u64,
    pub delay: Duration,
}

/// What a pointer event did to the widget
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    Ignored,
    Started,
    Moved { offset: f64 },
    Hit,
    Miss { next_slot: TargetSlot, clear: ErrorClear },
    Aborted,
}

/// Serializable snapshot for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    pub slot: TargetSlot,
    pub target: Rect,
    pub token_offset: f64,
    pub dragging: bool,
    pub verified: bool,
    pub attempts_since_reset: u32,
    pub feedback: Feedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_message: Option<&'static str>,
    /// Miss styling (cleared after the error delay; the feedback text stays)
    pub error: bool,
}

pub struct VerificationWidget {
    layout: WidgetLayout,
    slot: TargetSlot,
    drag: Option<DragState>,
    offset: f64,
    outcome: VerificationOutcome,
    error_visible: bool,
    error_epoch: u64,
    error_clear_delay: Duration,
    rng: StdRng,
    verified_tx: watch::Sender<bool>,
    reset_rx: watch::Receiver<bool>,
}

impl VerificationWidget {
    pub fn new(
        layout: WidgetLayout,
        error_clear_delay: Duration,
        verified_tx: watch::Sender<bool>,
        reset_rx: watch::Receiver<bool>,
    ) -> Self {
        let mut reset_rx = reset_rx;
        // Only changes after mount count as resets
        reset_rx.mark_unchanged();

        Self {
            layout,
            slot: TargetSlot::DEFAULT,
            drag: None,
            offset: 0.0,
            outcome: VerificationOutcome::default(),
            error_visible: false,
            error_epoch: 0,
            error_clear_delay,
            rng: StdRng::from_os_rng(),
            verified_tx,
            reset_rx,
        }
    }

    /// Replace the slot RNG (deterministic tests)
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn outcome(&self) -> VerificationOutcome {
        self.outcome
    }

    pub fn slot(&self) -> TargetSlot {
        self.slot
    }

    pub fn target_rect(&self) -> Rect {
        self.slot.resolve(self.layout.container, self.layout.target)
    }

    fn token_rect(&self) -> Rect {
        Rect::new(
            self.layout.track.left + self.offset,
            self.layout.track.top,
            self.layout.token.width,
            self.layout.token.height,
        )
    }

    /// Feed one pointer event through the drag state machine
    pub fn handle(&mut self, input: PointerInput) -> DragOutcome {
        self.sync_reset();

        let outcome = match (input.event, input.event.position()) {
            (PointerEvent::Down { .. }, Some(at)) => self.press(at),
            (PointerEvent::Move { .. }, Some(at)) => self.drag_to(at),
            (PointerEvent::Up { .. }, Some(at)) => self.release(at),
            // Leave / Cancel: released without a position
            _ => self.abort(),
        };

        tracing::trace!(
            kind = ?input.kind,
            phase = input.event.phase(),
            outcome = ?outcome,
            "Pointer event handled"
        );

        outcome
    }

    fn press(&mut self, at: Point) -> DragOutcome {
        if self.outcome.verified || self.drag.is_some() {
            return DragOutcome::Ignored;
        }
        let token = self.token_rect();
        if !token.contains(at) {
            return DragOutcome::Ignored;
        }

        self.drag = Some(DragState {
            grab_offset: at.x - token.left,
        });
        DragOutcome::Started
    }

    fn drag_to(&mut self, at: Point) -> DragOutcome {
        let Some(drag) = self.drag else {
            return DragOutcome::Ignored;
        };

        let raw = at.x - self.layout.track.left - drag.grab_offset;
        self.offset = raw.clamp(0.0, self.layout.max_offset());
        DragOutcome::Moved {
            offset: self.offset,
        }
    }

    fn release(&mut self, at: Point) -> DragOutcome {
        if self.drag.take().is_none() {
            return DragOutcome::Ignored;
        }

        if self.target_rect().contains(at) {
            self.outcome.verified = true;
            self.outcome.feedback = Feedback::Success;
            self.error_visible = false;
            self.error_epoch += 1;
            self.verified_tx.send_replace(true);

            tracing::debug!(
                slot = ?self.slot,
                attempts = self.outcome.attempts_since_reset,
                "Verification target hit"
            );
            return DragOutcome::Hit;
        }

        self.outcome.attempts_since_reset += 1;
        self.outcome.feedback = Feedback::Retry;
        self.verified_tx.send_replace(false);

        let previous = self.slot;
        self.slot = self.pick_next_slot();
        self.offset = 0.0;
        self.error_visible = true;
        self.error_epoch += 1;

        tracing::debug!(
            previous = ?previous,
            next = ?self.slot,
            attempts = self.outcome.attempts_since_reset,
            "Verification target missed"
        );

        DragOutcome::Miss {
            next_slot: self.slot,
            clear: ErrorClear {
                epoch: self.error_epoch,
                delay: self.error_clear_delay,
            },
        }
    }

    fn abort(&mut self) -> DragOutcome {
        if self.drag.take().is_none() {
            return DragOutcome::Ignored;
        }
        self.offset = 0.0;
        DragOutcome::Aborted
    }

    /// Uniform pick among every slot except the active one
    fn pick_next_slot(&mut self) -> TargetSlot {
        let candidates: Vec<TargetSlot> = TargetSlot::ALL
            .iter()
            .copied()
            .filter(|slot| *slot != self.slot)
            .collect();
        candidates[self.rng.random_range(0..candidates.len())]
    }

    /// Clear the miss styling. Returns false for a stale ticket.
    pub fn clear_error(&mut self, ticket: ErrorClear) -> bool {
        if ticket.epoch != self.error_epoch {
            return false;
        }
        self.error_visible = false;
        true
    }

    /// Apply a pending reset request from the parent, if any
    pub fn sync_reset(&mut self) -> bool {
        match self.reset_rx.has_changed() {
            Ok(true) => {
                self.reset_rx.mark_unchanged();
                self.reset();
                true
            }
            // A closed channel means the parent is gone; nothing to re-arm
            _ => false,
        }
    }

    /// Return to the initial unsolved state
    pub fn reset(&mut self) {
        self.slot = TargetSlot::DEFAULT;
        self.drag = None;
        self.offset = 0.0;
        self.outcome = VerificationOutcome::default();
        self.error_visible = false;
        self.error_epoch += 1;
        self.verified_tx.send_replace(false);

        tracing::debug!("Verification widget reset");
    }

    pub fn view(&self) -> WidgetView {
        WidgetView {
            slot: self.slot,
            target: self.target_rect(),
            token_offset: self.offset,
            dragging: self.drag.is_some(),
            verified: self.outcome.verified,
            attempts_since_reset: self.outcome.attempts_since_reset,
            feedback: self.outcome.feedback,
            feedback_message: self.outcome.feedback.message(),
            error: self.error_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        widget: VerificationWidget,
        verified_rx: watch::Receiver<bool>,
        reset_tx: watch::Sender<bool>,
    }

    fn harness_with(layout: WidgetLayout) -> Harness {
        let (verified_tx, verified_rx) = watch::channel(false);
        let (reset_tx, reset_rx) = watch::channel(false);
        let widget = VerificationWidget::new(
            layout,
            Duration::from_millis(1_000),
            verified_tx,
            reset_rx,
        )
        .with_rng(StdRng::seed_from_u64(7));
        Harness {
            widget,
            verified_rx,
            reset_tx,
        }
    }

    fn harness() -> Harness {
        harness_with(WidgetLayout::default())
    }

    fn down(x: f64, y: f64) -> PointerInput {
        PointerInput::mouse(PointerEvent::Down { x, y })
    }

    fn mv(x: f64, y: f64) -> PointerInput {
        PointerInput::mouse(PointerEvent::Move { x, y })
    }

    fn up(x: f64, y: f64) -> PointerInput {
        PointerInput::mouse(PointerEvent::Up { x, y })
    }

    /// Press the token at its resting position and release far outside every slot
    fn miss(widget: &mut VerificationWidget) -> DragOutcome {
        assert_eq!(widget.handle(down(30.0, 150.0)), DragOutcome::Started);
        widget.handle(up(-50.0, -50.0))
    }

    #[test]
    fn test_initial_state() {
        let h = harness();
        let view = h.widget.view();
        assert_eq!(view.slot, TargetSlot::DEFAULT);
        assert_eq!(view.target, Rect::new(240.0, 60.0, 60.0, 60.0));
        assert_eq!(view.token_offset, 0.0);
        assert!(!view.verified);
        assert!(!view.error);
        assert_eq!(view.feedback_message, None);
    }

    #[test]
    fn test_drag_and_drop_into_target() {
        let mut h = harness();

        assert_eq!(h.widget.handle(down(30.0, 150.0)), DragOutcome::Started);
        assert_eq!(
            h.widget.handle(mv(200.0, 150.0)),
            DragOutcome::Moved { offset: 170.0 }
        );
        // clamped to track width - token width
        assert_eq!(
            h.widget.handle(mv(900.0, 150.0)),
            DragOutcome::Moved { offset: 240.0 }
        );
        assert_eq!(h.widget.handle(up(270.0, 90.0)), DragOutcome::Hit);

        let view = h.widget.view();
        assert!(view.verified);
        assert_eq!(view.feedback, Feedback::Success);
        assert_eq!(view.token_offset, 240.0);
        assert!(*h.verified_rx.borrow_and_update());
    }

    #[test]
    fn test_drag_clamps_at_track_start() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        assert_eq!(
            h.widget.handle(mv(-400.0, 150.0)),
            DragOutcome::Moved { offset: 0.0 }
        );
    }

    #[test]
    fn test_release_on_target_corner_is_a_hit() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        assert_eq!(h.widget.handle(up(300.0, 120.0)), DragOutcome::Hit);

        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        assert_eq!(h.widget.handle(up(240.0, 60.0)), DragOutcome::Hit);
    }

    #[test]
    fn test_miss_relocates_target_and_snaps_back() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        h.widget.handle(mv(150.0, 150.0));

        let outcome = h.widget.handle(up(150.0, 150.0));
        let DragOutcome::Miss { next_slot, .. } = outcome else {
            panic!("expected a miss, got {outcome:?}");
        };
        assert_ne!(next_slot, TargetSlot::DEFAULT);

        let view = h.widget.view();
        assert_eq!(view.slot, next_slot);
        assert_eq!(view.token_offset, 0.0);
        assert_eq!(view.attempts_since_reset, 1);
        assert_eq!(view.feedback, Feedback::Retry);
        assert!(view.error);
        assert!(!view.verified);
        assert!(h.verified_rx.has_changed().unwrap());
        assert!(!*h.verified_rx.borrow_and_update());
    }

    #[test]
    fn test_consecutive_misses_never_repeat_a_slot() {
        let mut h = harness();
        let mut previous = h.widget.slot();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..200 {
            let DragOutcome::Miss { next_slot, .. } = miss(&mut h.widget) else {
                panic!("expected a miss");
            };
            assert_ne!(next_slot, previous);
            seen.insert(next_slot);
            previous = next_slot;
        }

        assert_eq!(seen.len(), TargetSlot::ALL.len());
        assert_eq!(h.widget.outcome().attempts_since_reset, 200);
    }

    #[test]
    fn test_click_without_movement_is_evaluated() {
        // Target large enough to cover the token's resting position
        let layout = WidgetLayout {
            container: Rect::new(0.0, 0.0, 100.0, 100.0),
            track: Rect::new(0.0, 40.0, 100.0, 20.0),
            token: Size::new(20.0, 20.0),
            target: Size::new(100.0, 100.0),
        };
        let mut h = harness_with(layout);
        assert_eq!(h.widget.handle(down(10.0, 50.0)), DragOutcome::Started);
        assert_eq!(h.widget.handle(up(10.0, 50.0)), DragOutcome::Hit);

        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        assert!(matches!(
            h.widget.handle(up(30.0, 150.0)),
            DragOutcome::Miss { .. }
        ));
    }

    #[test]
    fn test_press_outside_token_is_ignored() {
        let mut h = harness();
        assert_eq!(h.widget.handle(down(200.0, 150.0)), DragOutcome::Ignored);
        assert_eq!(h.widget.handle(up(270.0, 90.0)), DragOutcome::Ignored);
        assert!(!h.widget.outcome().verified);
    }

    #[test]
    fn test_leave_aborts_without_evaluating() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        h.widget.handle(mv(120.0, 150.0));

        let leave = PointerInput::touch(PointerEvent::Leave);
        assert_eq!(h.widget.handle(leave), DragOutcome::Aborted);

        let view = h.widget.view();
        assert_eq!(view.token_offset, 0.0);
        assert_eq!(view.attempts_since_reset, 0);
        assert_eq!(view.slot, TargetSlot::DEFAULT);
        assert!(!h.verified_rx.has_changed().unwrap());

        // the drag is gone, so a late release does nothing
        assert_eq!(h.widget.handle(up(270.0, 90.0)), DragOutcome::Ignored);
    }

    #[test]
    fn test_touch_and_mouse_share_the_state_machine() {
        let mut h = harness();
        let touch = |event| PointerInput::touch(event);
        assert_eq!(
            h.widget.handle(touch(PointerEvent::Down { x: 30.0, y: 150.0 })),
            DragOutcome::Started
        );
        assert_eq!(
            h.widget.handle(touch(PointerEvent::Up { x: 260.0, y: 100.0 })),
            DragOutcome::Hit
        );
    }

    #[test]
    fn test_verified_token_is_inert() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        h.widget.handle(mv(250.0, 150.0));
        h.widget.handle(up(270.0, 90.0));
        let before = h.widget.view();

        // token now rests at offset 220; pressing it does nothing
        assert_eq!(h.widget.handle(down(250.0, 150.0)), DragOutcome::Ignored);
        assert_eq!(h.widget.handle(mv(30.0, 150.0)), DragOutcome::Ignored);
        assert_eq!(h.widget.handle(up(-50.0, -50.0)), DragOutcome::Ignored);
        assert_eq!(h.widget.view(), before);
    }

    #[test]
    fn test_stale_error_clear_is_ignored() {
        let mut h = harness();
        let DragOutcome::Miss { clear: first, .. } = miss(&mut h.widget) else {
            panic!("expected a miss");
        };
        let DragOutcome::Miss { clear: second, .. } = miss(&mut h.widget) else {
            panic!("expected a miss");
        };
        assert_eq!(second.delay, Duration::from_millis(1_000));

        assert!(!h.widget.clear_error(first));
        assert!(h.widget.view().error);

        assert!(h.widget.clear_error(second));
        let view = h.widget.view();
        assert!(!view.error);
        // feedback text outlives the styling
        assert_eq!(view.feedback, Feedback::Retry);
    }

    #[test]
    fn test_reset_signal_rearms_widget() {
        let mut h = harness();
        miss(&mut h.widget);
        h.widget.handle(down(30.0, 150.0));
        h.widget.handle(up(-50.0, -50.0));
        assert!(!h.widget.sync_reset());

        h.reset_tx.send_modify(|value| *value = !*value);
        assert!(h.widget.sync_reset());

        let view = h.widget.view();
        assert_eq!(view.slot, TargetSlot::DEFAULT);
        assert_eq!(view.attempts_since_reset, 0);
        assert_eq!(view.feedback, Feedback::None);
        assert!(!view.error);
        assert!(!*h.verified_rx.borrow_and_update());
    }

    #[test]
    fn test_reset_clears_verified() {
        let mut h = harness();
        h.widget.handle(down(30.0, 150.0));
        h.widget.handle(up(270.0, 90.0));
        assert!(*h.verified_rx.borrow_and_update());

        // a toggle back to `false` still counts as a change
        h.reset_tx.send_replace(true);
        h.widget.sync_reset();
        h.reset_tx.send_replace(false);
        h.widget.sync_reset();

        assert!(!h.widget.outcome().verified);
        assert!(!*h.verified_rx.borrow_and_update());
        assert_eq!(h.widget.handle(down(30.0, 150.0)), DragOutcome::Started);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut h = harness();
        miss(&mut h.widget);

        h.reset_tx.send_modify(|value| *value = !*value);
        h.widget.sync_reset();
        let first = h.widget.view();

        h.reset_tx.send_modify(|value| *value = !*value);
        h.widget.sync_reset();
        let second = h.widget.view();

        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_invalidates_pending_error_clear() {
        let mut h = harness();
        let DragOutcome::Miss { clear, .. } = miss(&mut h.widget) else {
            panic!("expected a miss");
        };
        h.widget.reset();
        miss(&mut h.widget);
        assert!(!h.widget.clear_error(clear));
        assert!(h.widget.view().error);
    }
}
