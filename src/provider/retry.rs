//! Retry classification and backoff.
//!
//! [`RetryPolicy::decide`] maps a classified [`TransportError`] to a
//! [`RetryDecision`]; the provider client runs the loop. Keeping the
//! decision a plain value means the loop's counting and termination can be
//! tested without a transport.
//!
//! Budget rules:
//! - rate limits and transient failures share the `max_retries` budget,
//!   counting every failed attempt;
//! - an invalid optional argument may be stripped once per call, outside
//!   that budget;
//! - everything else gives up immediately.

use std::time::Duration;

use rand::Rng;

use super::config::ProviderConfig;
use crate::error::{ProviderError, TransportError};

/// Upper bound of the uniform jitter added to each backoff, in seconds.
const MAX_JITTER_SECS: f64 = 2.0;

/// What the retry loop should do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then try again.
    RetryAfter {
        /// How long to wait.
        delay: Duration,
        /// Whether to empty the rate-limit bucket before waiting.
        drain_bucket: bool,
    },
    /// Drop the named optional argument and retry immediately.
    StripArgument {
        /// Parameter reported by the back-end, if any.
        param: Option<String>,
    },
    /// Stop and report this error.
    GiveUp(ProviderError),
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Failed attempts counted against `max_retries`.
    pub retries: u32,
    /// Whether the one-shot argument strip has been used.
    pub argument_stripped: bool,
}

/// Backoff and budget settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: f64,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff_base: f64) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Creates a policy from provider limits.
    #[must_use]
    pub const fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base)
    }

    /// Retry budget.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry`, without jitter: `base^retry` seconds.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.backoff_base.powi(exponent);
        if secs.is_finite() && secs < Duration::MAX.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            Duration::MAX
        }
    }

    /// Decides what to do after `error`, drawing jitter from the thread RNG.
    pub fn decide(&self, error: &TransportError, state: &mut RetryState) -> RetryDecision {
        let jitter = rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS);
        self.decide_with_jitter(error, state, jitter)
    }

    /// Decides what to do after `error` with an explicit jitter in seconds.
    pub fn decide_with_jitter(
        &self,
        error: &TransportError,
        state: &mut RetryState,
        jitter_secs: f64,
    ) -> RetryDecision {
        match error {
            TransportError::RateLimited { .. } => self.count_and_back_off(
                state,
                jitter_secs,
                true,
                ProviderError::MaxRetriesExceeded {
                    attempts: state.retries + 1,
                },
            ),
            TransportError::Transient { message } => self.count_and_back_off(
                state,
                jitter_secs,
                false,
                ProviderError::Transport {
                    message: message.clone(),
                },
            ),
            TransportError::InvalidArgument { param, .. } => {
                if state.argument_stripped {
                    RetryDecision::GiveUp(ProviderError::InvalidArgument {
                        param: param.clone(),
                    })
                } else {
                    state.argument_stripped = true;
                    RetryDecision::StripArgument {
                        param: param.clone(),
                    }
                }
            }
            TransportError::EmptyResponse => RetryDecision::GiveUp(ProviderError::EmptyResponse),
            TransportError::Fatal { message } => {
                RetryDecision::GiveUp(ProviderError::FatalTransport {
                    message: message.clone(),
                })
            }
        }
    }

    /// Counts a failed attempt; backs off while budget remains.
    ///
    /// The attempt that reaches `max_retries` gives up without sleeping,
    /// so a call makes at most `max(1, max_retries)` transport attempts
    /// for these failure classes.
    fn count_and_back_off(
        &self,
        state: &mut RetryState,
        jitter_secs: f64,
        drain_bucket: bool,
        exhausted: ProviderError,
    ) -> RetryDecision {
        state.retries = state.retries.saturating_add(1);
        if state.retries >= self.max_retries {
            return RetryDecision::GiveUp(exhausted);
        }
        let jitter = Duration::from_secs_f64(jitter_secs.clamp(0.0, MAX_JITTER_SECS));
        RetryDecision::RetryAfter {
            delay: self.base_delay(state.retries).saturating_add(jitter),
            drain_bucket,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn rate_limited() -> TransportError {
        TransportError::RateLimited {
            message: "429".to_string(),
        }
    }

    #[test]
    fn test_base_delay_is_strictly_increasing() {
        let policy = RetryPolicy::new(5, 4.0);
        let delays: Vec<Duration> = (1..=5).map(|r| policy.base_delay(r)).collect();
        assert_eq!(delays[0], Duration::from_secs(4));
        assert_eq!(delays[1], Duration::from_secs(16));
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_base_delay_saturates() {
        let policy = RetryPolicy::new(5, 4.0);
        assert_eq!(policy.base_delay(10_000), Duration::MAX);
    }

    #[test]
    fn test_rate_limit_backs_off_with_jitter_and_drains() {
        let policy = RetryPolicy::new(5, 2.0);
        let mut state = RetryState::default();
        let decision = policy.decide_with_jitter(&rate_limited(), &mut state, 0.5);
        assert_eq!(
            decision,
            RetryDecision::RetryAfter {
                delay: Duration::from_millis(2500),
                drain_bucket: true,
            }
        );
        assert_eq!(state.retries, 1);
    }

    #[test]
    fn test_rate_limit_gives_up_when_budget_is_spent() {
        let policy = RetryPolicy::new(3, 2.0);
        let mut state = RetryState::default();
        let mut sleeps = 0;
        let outcome = loop {
            match policy.decide_with_jitter(&rate_limited(), &mut state, 0.0) {
                RetryDecision::RetryAfter { .. } => sleeps += 1,
                other => break other,
            }
        };
        assert_eq!(sleeps, 2);
        assert_eq!(
            outcome,
            RetryDecision::GiveUp(ProviderError::MaxRetriesExceeded { attempts: 3 })
        );
    }

    #[test]
    fn test_random_jitter_is_bounded() {
        let policy = RetryPolicy::new(5, 4.0);
        for _ in 0..100 {
            let mut state = RetryState::default();
            match policy.decide(&rate_limited(), &mut state) {
                RetryDecision::RetryAfter { delay, .. } => {
                    assert!(delay >= Duration::from_secs(4));
                    assert!(delay < Duration::from_secs(6));
                }
                other => panic!("unexpected decision {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_argument_strips_once_without_spending_budget() {
        let policy = RetryPolicy::new(1, 2.0);
        let mut state = RetryState::default();
        let err = TransportError::InvalidArgument {
            param: Some("task_type".to_string()),
            message: "bad".to_string(),
        };
        assert_eq!(
            policy.decide_with_jitter(&err, &mut state, 0.0),
            RetryDecision::StripArgument {
                param: Some("task_type".to_string())
            }
        );
        assert_eq!(state.retries, 0);
        assert_eq!(
            policy.decide_with_jitter(&err, &mut state, 0.0),
            RetryDecision::GiveUp(ProviderError::InvalidArgument {
                param: Some("task_type".to_string())
            })
        );
    }

    #[test]
    fn test_fatal_and_empty_give_up_immediately() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();
        let fatal = TransportError::Fatal {
            message: "bad key".to_string(),
        };
        assert!(matches!(
            policy.decide_with_jitter(&fatal, &mut state, 0.0),
            RetryDecision::GiveUp(ProviderError::FatalTransport { .. })
        ));
        assert_eq!(
            policy.decide_with_jitter(&TransportError::EmptyResponse, &mut state, 0.0),
            RetryDecision::GiveUp(ProviderError::EmptyResponse)
        );
        assert_eq!(state.retries, 0);
    }

    #[test]
    fn test_transient_retries_without_draining() {
        let policy = RetryPolicy::new(2, 4.0);
        let mut state = RetryState::default();
        let err = TransportError::Transient {
            message: "reset".to_string(),
        };
        assert!(matches!(
            policy.decide_with_jitter(&err, &mut state, 0.0),
            RetryDecision::RetryAfter {
                drain_bucket: false,
                ..
            }
        ));
        assert!(matches!(
            policy.decide_with_jitter(&err, &mut state, 0.0),
            RetryDecision::GiveUp(ProviderError::Transport { .. })
        ));
    }
}
