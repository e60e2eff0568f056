use std::error::Error as StdError;

use crate::PollOutcome;
use crate::RetryError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out waiting for {condition} after {attempts} attempts ({last})")]
    Timeout {
        condition: String,
        attempts: u32,
        last: PollOutcome,
    },

    #[error("cancelled while waiting for {condition} after {attempts} attempts")]
    Cancelled { condition: String, attempts: u32 },

    #[error("expected {expected} ready nodes, observed {observed}")]
    Consistency { expected: usize, observed: usize },

    #[error("failed to list nodes")]
    Fetch(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn from_retry(condition: &str, err: RetryError<PollOutcome>) -> Self {
        let condition = condition.to_string();
        match err {
            RetryError::Exhausted { attempts, last } => Self::Timeout {
                condition,
                attempts,
                last,
            },
            RetryError::Cancelled { attempts } => Self::Cancelled {
                condition,
                attempts,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
