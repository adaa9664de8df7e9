//! Drag-based human verification.
//!
//! A headless state machine: the host forwards pointer events and
//! geometry, the widget decides hit/miss and reports `verified` upward.

mod pointer;
mod widget;

pub use pointer::{PointerEvent, PointerInput, PointerKind};
pub use widget::{DragOutcome, ErrorClear, VerificationWidget, WidgetLayout, WidgetView};
