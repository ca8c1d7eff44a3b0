use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
  /// Delay between attempts, in milliseconds.
  pub interval_ms: u64,
  pub max_attempts: u32,
}

impl Default for PollConfig {
  fn default() -> Self {
    Self {
      interval_ms: 1_000,
      max_attempts: 30,
    }
  }
}

impl PollConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
  #[error("polling cancelled")]
  Cancelled,

  #[error("resource not available after {attempts} attempts")]
  Exhausted { attempts: u32 },
}

/// Call `fetch` until it yields a value, waiting `config.interval()` between
/// attempts.
///
/// Stops with [`PollError::Cancelled`] as soon as `cancel` fires, including
/// while an attempt is in flight.
pub async fn poll_until<T, F, Fut>(
  mut fetch: F,
  config: &PollConfig,
  cancel: &CancellationToken,
) -> Result<T, PollError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Option<T>>,
{
  for attempt in 1..=config.max_attempts {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(PollError::Cancelled),
      value = fetch() => {
        if let Some(value) = value {
          debug!(attempt, "poll succeeded");
          return Ok(value);
        }
      }
    }

    if attempt < config.max_attempts {
      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PollError::Cancelled),
        _ = tokio::time::sleep(config.interval()) => {}
      }
    }
  }

  Err(PollError::Exhausted {
    attempts: config.max_attempts,
  })
}
