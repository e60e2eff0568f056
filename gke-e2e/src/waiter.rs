use crate::Error;
use crate::NodeLister;
use crate::NodeView;
use crate::PollOutcome;
use crate::RetryPolicy;
use crate::retry;

/// Waits for a cluster's nodes to register and become ready.
///
/// The waiter only borrows the cluster handle and never changes the cluster.
/// Every call starts a fresh attempt counter; nothing is remembered between
/// calls.
#[derive(Debug)]
pub struct ReadinessWaiter<'a, L> {
    nodes: &'a L,
}

impl<'a, L> ReadinessWaiter<'a, L>
where
    L: NodeLister,
{
    pub fn new(nodes: &'a L) -> Self {
        Self { nodes }
    }

    /// Poll until exactly `expected` nodes are registered, ready or not.
    pub async fn wait_for_expected_node_count(
        &self,
        expected: usize,
        policy: &RetryPolicy,
    ) -> Result<(), Error> {
        let condition = format!("{expected} nodes to be registered");
        let outcome = self
            .wait_until(&condition, policy, move |nodes| node_count(nodes, expected))
            .await?;
        tracing::info!(expected, "{outcome}");
        Ok(())
    }

    /// Poll until at least one node is registered and every node is ready.
    pub async fn wait_for_all_nodes_ready(&self, policy: &RetryPolicy) -> Result<(), Error> {
        let outcome = self
            .wait_until("all nodes to be ready", policy, all_ready)
            .await?;
        tracing::info!("{outcome}");
        Ok(())
    }

    /// Count the ready nodes with a single, unretried fetch.
    pub async fn ready_node_count(&self) -> Result<usize, Error> {
        let nodes = self
            .nodes
            .list_nodes()
            .await
            .map_err(|err| Error::Fetch(Box::new(err)))?;
        Ok(nodes.iter().filter(|node| node.ready).count())
    }

    /// Wait for the node count, then for readiness, then double-check that
    /// the number of ready nodes is exactly `expected`.
    pub async fn verify_cluster_is_ready(
        &self,
        expected: usize,
        policy: &RetryPolicy,
    ) -> Result<(), Error> {
        self.wait_for_expected_node_count(expected, policy).await?;
        self.wait_for_all_nodes_ready(policy).await?;

        let observed = self.ready_node_count().await?;
        if observed != expected {
            return Err(Error::Consistency { expected, observed });
        }

        tracing::info!(expected, "Cluster is ready");
        Ok(())
    }

    async fn wait_until<C>(
        &self,
        condition: &str,
        policy: &RetryPolicy,
        check: C,
    ) -> Result<PollOutcome, Error>
    where
        C: Fn(&[NodeView]) -> Result<PollOutcome, PollOutcome> + Copy,
    {
        let nodes = self.nodes;
        retry(policy, condition, move || async move {
            let listed = fetch(nodes).await?;
            check(&listed)
        })
        .await
        .map_err(|err| Error::from_retry(condition, err))
    }
}

async fn fetch<L: NodeLister>(nodes: &L) -> Result<Vec<NodeView>, PollOutcome> {
    nodes.list_nodes().await.map_err(|err| {
        tracing::debug!(error = %err, "Failed to list nodes");
        PollOutcome::FetchFailed(err.to_string())
    })
}

fn node_count(nodes: &[NodeView], expected: usize) -> Result<PollOutcome, PollOutcome> {
    let observed = nodes.len();
    if observed == expected {
        Ok(PollOutcome::Satisfied(format!(
            "all {expected} nodes registered"
        )))
    } else {
        Err(PollOutcome::Unsatisfied(format!(
            "expected {expected} nodes, observed {observed}"
        )))
    }
}

fn all_ready(nodes: &[NodeView]) -> Result<PollOutcome, PollOutcome> {
    if nodes.is_empty() {
        return Err(PollOutcome::Unsatisfied("no nodes registered".to_string()));
    }

    let not_ready = nodes
        .iter()
        .filter(|node| !node.ready)
        .map(|node| node.identifier.as_str())
        .collect::<Vec<_>>();

    if not_ready.is_empty() {
        Ok(PollOutcome::Satisfied(format!(
            "all {} nodes ready",
            nodes.len()
        )))
    } else {
        Err(PollOutcome::Unsatisfied(format!(
            "{} of {} nodes not ready: {}",
            not_ready.len(),
            nodes.len(),
            not_ready.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests;
