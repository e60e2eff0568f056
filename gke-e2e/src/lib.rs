//! Readiness checks for freshly provisioned GKE clusters.
//!
//! The cluster itself is reached through a [`NodeLister`]; everything here is
//! read-only and built on a single [`retry`] combinator.

pub use error::Error;
pub use node::NodeLister;
pub use node::NodeView;
pub use node::PollOutcome;
pub use retry::ParseIntervalError;
pub use retry::RetryError;
pub use retry::RetryPolicy;
pub use retry::ZeroAttempts;
pub use retry::parse_interval;
pub use retry::retry;
pub use waiter::ReadinessWaiter;

mod error;
mod node;
mod retry;
mod waiter;
