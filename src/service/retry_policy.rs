use crate::error::RetryClass;
use backon::ExponentialBuilder;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// The one retry policy for outbound jobs.
///
/// Retry `n` (0-based) after a rate limit waits
/// `max(retry_after, base * 2^n + U[0, 1s))`; after a transient failure it
/// waits `base * 2^n` without jitter; anything else is returned to the caller.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Total invocations allowed for one job, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Deterministic exponential schedule. backon counts retries, so one
    /// fewer than the attempt budget.
    pub fn schedule(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_delay(MAX_BACKOFF)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    fn jitter(&self) -> Duration {
        if self.jitter {
            Duration::from_secs_f64(rand::random::<f64>())
        } else {
            Duration::ZERO
        }
    }

    /// Shape the schedule's next delay for a failure of `class`; `None` gives up.
    pub fn adjust(&self, class: &RetryClass, next: Option<Duration>) -> Option<Duration> {
        let backoff = next?;
        match class {
            RetryClass::Fatal => None,
            RetryClass::Transient => Some(backoff),
            RetryClass::RateLimited { retry_after } => {
                let backoff = backoff + self.jitter();
                Some(retry_after.map_or(backoff, |hint| hint.max(backoff)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;

    fn limited(secs: Option<u64>) -> RetryClass {
        RetryClass::RateLimited {
            retry_after: secs.map(Duration::from_secs),
        }
    }

    #[test]
    fn schedule_doubles_and_counts_retries() {
        let delays: Vec<Duration> = RetryPolicy::default().schedule().build().collect();
        assert_eq!(delays.len(), 2);
        assert_eq!(delays[0], Duration::from_secs(1));
        assert!((delays[1].as_secs_f64() - 2.0).abs() < 1e-3, "got {:?}", delays[1]);
    }

    #[test]
    fn rate_limit_delay_adds_bounded_jitter() {
        let policy = RetryPolicy::default();
        for floor in [1u64, 2] {
            for _ in 0..50 {
                let delay = policy
                    .adjust(&limited(None), Some(Duration::from_secs(floor)))
                    .unwrap();
                let secs = delay.as_secs_f64();
                let floor = floor as f64;
                assert!(secs >= floor && secs < floor + 1.0, "got {secs}");
            }
        }
    }

    #[test]
    fn retry_after_hint_wins_when_longer() {
        let policy = RetryPolicy::default();
        let one = Some(Duration::from_secs(1));
        assert_eq!(
            policy.adjust(&limited(Some(60)), one),
            Some(Duration::from_secs(60))
        );
        let delay = policy.adjust(&limited(Some(0)), one).unwrap();
        assert!(delay >= Duration::from_secs(1));
    }

    #[test]
    fn transient_delay_has_no_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.adjust(&RetryClass::Transient, Some(Duration::from_secs(2))),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn gives_up_on_fatal_or_exhaustion() {
        let policy = RetryPolicy::default();
        let one = Some(Duration::from_secs(1));
        assert_eq!(policy.adjust(&RetryClass::Fatal, one), None);
        assert_eq!(policy.adjust(&limited(Some(5)), None), None);
        assert_eq!(policy.adjust(&RetryClass::Transient, None), None);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.schedule().build().next(), None);
    }
}
