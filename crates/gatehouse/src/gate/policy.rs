//! Lockout thresholds and the user-facing messages they produce.

use gate_common::ceil_minutes;
use gate_common::constants::{LOCKOUT_DURATION_MS, MAX_ATTEMPTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failed logins that install the lockout window
    pub max_attempts: u32,
    pub lockout_duration_ms: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lockout_duration_ms: LOCKOUT_DURATION_MS,
        }
    }
}

fn plural(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

impl LockoutPolicy {
    /// Attempts left after one more failure on top of `failure_count`
    pub fn remaining_after_failure(&self, failure_count: u32) -> i64 {
        self.max_attempts as i64 - (failure_count as i64 + 1)
    }

    pub fn lockout_minutes(&self) -> u64 {
        ceil_minutes(self.lockout_duration_ms)
    }

    pub fn locked_message(&self, remaining_minutes: u64) -> String {
        format!(
            "Account locked. Try again in {}.",
            plural(remaining_minutes, "minute", "minutes")
        )
    }

    pub fn verification_message(&self) -> String {
        "Please complete the verification first.".to_string()
    }

    pub fn remaining_message(&self, remaining: u64) -> String {
        format!(
            "Invalid username or password. {} remaining.",
            plural(remaining, "attempt", "attempts")
        )
    }

    pub fn lockout_message(&self) -> String {
        format!(
            "Too many failed attempts. Account locked for {}.",
            plural(self.lockout_minutes(), "minute", "minutes")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let policy = LockoutPolicy::default();
        assert_eq!(
            policy.remaining_message(4),
            "Invalid username or password. 4 attempts remaining."
        );
        assert_eq!(
            policy.remaining_message(1),
            "Invalid username or password. 1 attempt remaining."
        );
        assert_eq!(
            policy.lockout_message(),
            "Too many failed attempts. Account locked for 5 minutes."
        );
        assert_eq!(policy.locked_message(1), "Account locked. Try again in 1 minute.");
    }

    #[test]
    fn test_remaining_after_failure() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.remaining_after_failure(0), 4);
        assert_eq!(policy.remaining_after_failure(4), 0);
        assert_eq!(policy.remaining_after_failure(7), -3);
    }
}
