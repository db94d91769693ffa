//! Brute-force lockout for unlock attempts
//!
//! State is process-memory only and is lost on restart.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::settings::VaultSettings;

/// Longest cooldown window that will ever be scheduled
pub const MAX_LOCKOUT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Tracks consecutive unlock failures and the cooldown they trigger
///
/// By default every cooldown lasts the base window and the failure count
/// starts over once it has elapsed. With escalation enabled the count is
/// kept, so each further failure re-engages a doubled window.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    threshold: u32,
    base_window: Duration,
    max_window: Duration,
    escalate: bool,
    consecutive_failures: u32,
    /// Number of times the lockout engaged since the last success
    engagements: u32,
    lockout_until: Option<Instant>,
}

impl LockoutPolicy {
    pub fn new(threshold: u32, base_window: Duration, max_window: Duration) -> Self {
        let base_window = base_window.min(MAX_LOCKOUT_WINDOW);
        Self {
            threshold: threshold.max(1),
            base_window,
            max_window: max_window.clamp(base_window, MAX_LOCKOUT_WINDOW),
            escalate: false,
            consecutive_failures: 0,
            engagements: 0,
            lockout_until: None,
        }
    }

    /// Double the window on each re-engagement, up to the maximum
    pub fn escalating(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }

    pub fn from_settings(settings: &VaultSettings) -> Self {
        Self::new(
            settings.lockout_threshold,
            Duration::from_secs(settings.lockout_base_secs),
            Duration::from_secs(settings.lockout_max_secs),
        )
        .escalating(settings.lockout_escalation)
    }

    /// Count a failed unlock
    ///
    /// Returns the cooldown window when this failure engages the lockout.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.expire();

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            debug!(
                "Unlock failure {}/{}",
                self.consecutive_failures, self.threshold
            );
            return None;
        }

        let window = if self.escalate {
            let factor = 2u32.saturating_pow(self.engagements);
            self.base_window.saturating_mul(factor).min(self.max_window)
        } else {
            self.base_window
        };
        self.engagements = self.engagements.saturating_add(1);

        let now = Instant::now();
        self.lockout_until = Some(now.checked_add(window).unwrap_or(now));

        warn!(
            "Unlock locked out for {}s after {} consecutive failures",
            window.as_secs(),
            self.consecutive_failures
        );
        Some(window)
    }

    /// Reset after a successful unlock
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.engagements = 0;
        self.lockout_until = None;
    }

    pub fn is_locked_out(&self) -> bool {
        self.lockout_until
            .map_or(false, |until| Instant::now() < until)
    }

    /// Time left in the current cooldown (zero when not locked out)
    pub fn remaining(&self) -> Duration {
        self.lockout_until
            .map_or(Duration::ZERO, |until| {
                until.saturating_duration_since(Instant::now())
            })
    }

    /// Remaining cooldown rounded up to whole seconds
    pub fn remaining_seconds(&self) -> u64 {
        let remaining = self.remaining();
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    /// Consecutive failures that count towards the next lockout
    pub fn failures(&self) -> u32 {
        if self.has_expired() && !self.escalate {
            0
        } else {
            self.consecutive_failures
        }
    }

    fn has_expired(&self) -> bool {
        self.lockout_until
            .map_or(false, |until| Instant::now() >= until)
    }

    /// Close out an elapsed cooldown
    fn expire(&mut self) {
        if !self.has_expired() {
            return;
        }
        self.lockout_until = None;
        if !self.escalate {
            self.consecutive_failures = 0;
            debug!("Lockout expired, failure count reset");
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_settings(&VaultSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_threshold_engages_lockout() {
        let mut policy = LockoutPolicy::default();

        for _ in 0..4 {
            assert_eq!(policy.record_failure(), None);
            assert!(!policy.is_locked_out());
        }

        assert_eq!(policy.record_failure(), Some(Duration::from_secs(30)));
        assert!(policy.is_locked_out());
        assert_eq!(policy.remaining_seconds(), 30);
        assert_eq!(policy.failures(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_expires() {
        let mut policy = LockoutPolicy::default();
        for _ in 0..5 {
            policy.record_failure();
        }

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(policy.is_locked_out());
        assert_eq!(policy.remaining_seconds(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!policy.is_locked_out());
        assert_eq!(policy.remaining_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_starts_over_after_cooldown() {
        let mut policy = LockoutPolicy::default();
        for _ in 0..5 {
            policy.record_failure();
        }

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(policy.failures(), 0);

        // a single wrong guess after the cooldown does not lock again
        for _ in 0..4 {
            assert_eq!(policy.record_failure(), None);
        }
        assert!(!policy.is_locked_out());

        // and the next lockout uses the same fixed window
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_escalates_and_caps() {
        let mut policy = LockoutPolicy::new(2, Duration::from_secs(30), Duration::from_secs(100))
            .escalating(true);

        assert_eq!(policy.record_failure(), None);
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(policy.failures(), 2);
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(60)));
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(100)));
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_windows_are_clamped() {
        let mut policy =
            LockoutPolicy::new(1, Duration::from_secs(u64::MAX), Duration::from_secs(u64::MAX))
                .escalating(true);

        assert_eq!(policy.record_failure(), Some(MAX_LOCKOUT_WINDOW));
        assert_eq!(policy.record_failure(), Some(MAX_LOCKOUT_WINDOW));
        assert!(policy.is_locked_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets() {
        let mut policy = LockoutPolicy::default();
        for _ in 0..5 {
            policy.record_failure();
        }
        assert!(policy.is_locked_out());

        policy.record_success();
        assert!(!policy.is_locked_out());
        assert_eq!(policy.failures(), 0);

        // back to the first window after a reset
        for _ in 0..4 {
            assert_eq!(policy.record_failure(), None);
        }
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(30)));
    }
}
