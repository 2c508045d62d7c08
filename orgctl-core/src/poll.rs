//! Bounded status polling.
//!
//! Several commands repeat the same pattern: invoke a status-check command,
//! inspect a status field, and try again after a fixed delay until a
//! terminal value appears. The loop carries an explicit attempt budget;
//! exhausting it is a distinct [`OrgError::PollTimeout`], not an
//! external-command failure.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::error::{OrgError, Result};

/// Default delay between consecutive status checks
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Default attempt budget (~10 minutes at the default interval)
pub const POLL_MAX_ATTEMPTS: u32 = 600;

/// Outcome of one polling attempt
#[derive(Debug)]
pub enum PollStatus<T> {
    /// Terminal value reached; stop polling
    Ready(T),
    /// Not there yet; wait the interval and try again
    Pending,
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(POLL_INTERVAL_MS),
            max_attempts: POLL_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Invoke `op` until it reports [`PollStatus::Ready`], sleeping the
/// configured interval before every attempt after the first.
///
/// Errors from `op` abort the loop immediately. Exhausting the attempt
/// budget yields [`OrgError::PollTimeout`].
pub async fn poll_until<T, F, Fut>(config: PollConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            sleep(config.interval).await;
        }

        match op().await? {
            PollStatus::Ready(value) => return Ok(value),
            PollStatus::Pending => {
                debug!("poll attempt {}/{} pending", attempt, config.max_attempts);
            }
        }
    }

    Err(OrgError::PollTimeout {
        attempts: config.max_attempts,
        waited_ms: config.interval.as_millis() as u64 * (config.max_attempts as u64 - 1),
    })
}
