//! Bounded polling for asynchronous provider state
//!
//! Every asynchronous provider operation (snapshot copy, volume
//! availability, detach completion) is followed by an explicit
//! wait-for-terminal-state rather than a fixed sleep. The wait polls at a
//! fixed interval up to an overall deadline; exceeding the deadline is a
//! distinguishable `Timeout` error, fatal to the saga and never retried
//! internally.

use backon::{BackoffBuilder, ConstantBuilder};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Fixed-interval polling configuration.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between terminal-state checks.
    pub interval: Duration,
    /// Overall deadline across all checks.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: redress_common::defaults::DEFAULT_POLL_INTERVAL,
            deadline: redress_common::defaults::DEFAULT_VOLUME_WAIT,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }
}

/// Why a wait ended without the resource reaching its terminal state.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Deadline elapsed before the terminal state was observed.
    #[error("timed out waiting for {operation} after {waited:?} ({attempts} attempts)")]
    Timeout {
        operation: String,
        waited: Duration,
        attempts: u32,
    },

    /// The terminal-state check itself failed.
    #[error("check failed while waiting for {operation}")]
    Check {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Poll `check` at a fixed interval until it returns `Ok(true)`, the
/// deadline elapses, or the check errors.
pub async fn wait_until<F, Fut>(
    config: PollConfig,
    operation: &str,
    check: F,
) -> Result<(), WaitError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let max_polls = (config.deadline.as_millis() / config.interval.as_millis().max(1)).max(1);
    let mut delays = ConstantBuilder::default()
        .with_delay(config.interval)
        .with_max_times(max_polls as usize)
        .build();

    loop {
        attempts += 1;

        if start.elapsed() >= config.deadline {
            return Err(WaitError::Timeout {
                operation: operation.to_string(),
                waited: start.elapsed(),
                attempts,
            });
        }

        match check().await {
            Ok(true) => {
                debug!(operation = %operation, attempts, "terminal state reached");
                return Ok(());
            }
            Ok(false) => match delays.next() {
                Some(delay) => {
                    debug!(
                        operation = %operation,
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        "not ready, polling again"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(WaitError::Timeout {
                        operation: operation.to_string(),
                        waited: start.elapsed(),
                        attempts,
                    });
                }
            },
            Err(source) => {
                return Err(WaitError::Check {
                    operation: operation.to_string(),
                    source,
                });
            }
        }
    }
}
