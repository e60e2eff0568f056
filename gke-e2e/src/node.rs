use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

use serde::Deserialize;
use serde::Serialize;

/// A single cluster node as seen by one poll attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub identifier: String,
    pub ready: bool,
}

impl NodeView {
    pub fn new(identifier: impl ToString, ready: bool) -> Self {
        let identifier = identifier.to_string();
        Self { identifier, ready }
    }

    pub fn ready(identifier: impl ToString) -> Self {
        Self::new(identifier, true)
    }

    pub fn not_ready(identifier: impl ToString) -> Self {
        Self::new(identifier, false)
    }
}

/// Source of node snapshots for a single cluster.
///
/// Implementations must be read-only: listing nodes never changes the cluster.
pub trait NodeLister {
    type Error: StdError + Send + Sync + 'static;

    fn list_nodes(&self) -> impl Future<Output = Result<Vec<NodeView>, Self::Error>> + Send;
}

/// Result of one poll attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition holds.
    Satisfied(String),
    /// Nodes were listed but the condition does not hold yet.
    Unsatisfied(String),
    /// The node listing itself failed.
    FetchFailed(String),
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Satisfied(detail) | Self::Unsatisfied(detail) | Self::FetchFailed(detail) => {
                detail
            }
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed(error) => write!(f, "failed to list nodes: {error}"),
            Self::Satisfied(detail) | Self::Unsatisfied(detail) => f.write_str(detail),
        }
    }
}
