use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::*;

const INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
struct ListError(&'static str);

type Response = Result<Vec<NodeView>, ListError>;

/// Replays `responses` in order, repeating the last one forever.
#[derive(Debug)]
struct ScriptedNodes {
    responses: Vec<Response>,
    calls: AtomicUsize,
}

impl ScriptedNodes {
    fn new(responses: Vec<Response>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    fn always(response: Response) -> Self {
        Self::new(vec![response])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NodeLister for ScriptedNodes {
    type Error = ListError;

    async fn list_nodes(&self) -> Result<Vec<NodeView>, ListError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.responses.len() - 1);
        self.responses[index].clone()
    }
}

fn ready(count: usize) -> Response {
    Ok((0..count)
        .map(|n| NodeView::ready(format!("gke-node-{n}")))
        .collect())
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, INTERVAL).unwrap()
}

#[tokio::test(start_paused = true)]
async fn node_count_succeeds_on_kth_attempt() {
    let nodes = ScriptedNodes::new(vec![ready(1), ready(2), ready(3)]);
    let start = Instant::now();

    ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(3, &policy(5))
        .await
        .unwrap();

    assert_eq!(nodes.calls(), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= INTERVAL * 2, "{elapsed:?}");
    assert!(elapsed < INTERVAL * 3, "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn node_count_times_out_after_max_attempts() {
    let nodes = ScriptedNodes::always(ready(2));
    let start = Instant::now();

    let err = ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(3, &policy(4))
        .await
        .unwrap_err();

    assert_eq!(nodes.calls(), 4);
    let elapsed = start.elapsed();
    assert!(elapsed >= INTERVAL * 3, "{elapsed:?}");
    assert!(elapsed < INTERVAL * 4, "{elapsed:?}");

    match err {
        Error::Timeout {
            attempts, last, ..
        } => {
            assert_eq!(attempts, 4);
            assert_eq!(
                last,
                PollOutcome::Unsatisfied("expected 3 nodes, observed 2".to_string())
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn node_count_is_idempotent() {
    let nodes = ScriptedNodes::always(ready(3));
    let waiter = ReadinessWaiter::new(&nodes);

    waiter
        .wait_for_expected_node_count(3, &policy(5))
        .await
        .unwrap();
    assert_eq!(nodes.calls(), 1);

    waiter
        .wait_for_expected_node_count(3, &policy(5))
        .await
        .unwrap();
    assert_eq!(nodes.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_expected_nodes_matches_empty_cluster() {
    let nodes = ScriptedNodes::always(ready(0));

    ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(0, &policy(3))
        .await
        .unwrap();

    assert_eq!(nodes.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_errors_are_retried() {
    let nodes = ScriptedNodes::new(vec![
        Err(ListError("connection refused")),
        Err(ListError("unauthorized")),
        ready(3),
    ]);

    ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(3, &policy(3))
        .await
        .unwrap();

    assert_eq!(nodes.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_carries_last_fetch_error() {
    let nodes = ScriptedNodes::always(Err(ListError("connection refused")));

    let err = ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(3, &policy(2))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("connection refused"), "{err}");
    assert!(err.to_string().contains("after 2 attempts"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn readiness_retries_until_all_nodes_ready() {
    let nodes = ScriptedNodes::new(vec![
        Ok(vec![
            NodeView::ready("gke-node-0"),
            NodeView::not_ready("gke-node-1"),
            NodeView::ready("gke-node-2"),
        ]),
        ready(3),
    ]);

    ReadinessWaiter::new(&nodes)
        .wait_for_all_nodes_ready(&policy(5))
        .await
        .unwrap();

    assert_eq!(nodes.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn readiness_names_the_nodes_still_not_ready() {
    let nodes = ScriptedNodes::always(Ok(vec![
        NodeView::ready("gke-node-0"),
        NodeView::not_ready("gke-node-1"),
    ]));

    let err = ReadinessWaiter::new(&nodes)
        .wait_for_all_nodes_ready(&policy(3))
        .await
        .unwrap_err();

    assert_eq!(nodes.calls(), 3);
    assert!(err.to_string().contains("1 of 2 nodes not ready: gke-node-1"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn empty_cluster_is_not_ready() {
    let nodes = ScriptedNodes::always(ready(0));

    let err = ReadinessWaiter::new(&nodes)
        .wait_for_all_nodes_ready(&policy(2))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(nodes.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn verify_ready_cluster_takes_three_fetches() {
    let nodes = ScriptedNodes::always(ready(3));

    ReadinessWaiter::new(&nodes)
        .verify_cluster_is_ready(3, &policy(30))
        .await
        .unwrap();

    assert_eq!(nodes.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn verify_fails_when_count_never_matches() {
    let nodes = ScriptedNodes::always(ready(2));

    let err = ReadinessWaiter::new(&nodes)
        .verify_cluster_is_ready(3, &policy(6))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(nodes.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn verify_reports_ready_count_mismatch_without_retrying() {
    let nodes = ScriptedNodes::new(vec![ready(3), ready(3), ready(2)]);

    let err = ReadinessWaiter::new(&nodes)
        .verify_cluster_is_ready(3, &policy(30))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Consistency {
                expected: 3,
                observed: 2
            }
        ),
        "{err}"
    );
    assert_eq!(nodes.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn ready_count_fetch_failure_is_terminal() {
    let nodes = ScriptedNodes::always(Err(ListError("forbidden")));

    let err = ReadinessWaiter::new(&nodes)
        .ready_node_count()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fetch(_)), "{err}");
    assert_eq!(nodes.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_stops_polling() {
    let nodes = ScriptedNodes::always(ready(1));
    let token = CancellationToken::new();
    token.cancel();
    let policy = policy(30).with_cancellation(token);

    let err = ReadinessWaiter::new(&nodes)
        .wait_for_expected_node_count(3, &policy)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { attempts: 0, .. }), "{err}");
    assert_eq!(nodes.calls(), 0);
}
