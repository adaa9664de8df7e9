//! Admin login attempt gate.
//!
//! Tracks failed logins, installs a wall-clock lockout window after too
//! many of them, and re-arms the drag challenge after every failure.

mod attempt_gate;
mod policy;
mod store;

pub use attempt_gate::{AttemptGate, GateView, PendingLogin};
pub use policy::LockoutPolicy;
pub use store::{AttemptStore, MemoryAttemptStore, RedisAttemptStore};
