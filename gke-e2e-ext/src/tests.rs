use super::*;

#[test]
fn node_without_status_is_not_ready() {
    let node = corev1::Node::new("gke-node-0");
    assert!(!node.is_ready());
    assert_eq!(node.node_view(), NodeView::not_ready("gke-node-0"));
}

#[test]
fn node_ready_condition() {
    let node = corev1::Node::new("gke-node-0").with_ready(true);
    assert!(node.is_ready());
    assert_eq!(node.node_view(), NodeView::ready("gke-node-0"));

    let node = node.with_ready(false);
    assert!(!node.is_ready());
}

#[test]
fn other_conditions_do_not_count() {
    let pressure = corev1::NodeCondition {
        type_: "MemoryPressure".to_string(),
        status: CONDITION_TRUE.to_string(),
        ..default()
    };
    let node = corev1::Node {
        status: Some(corev1::NodeStatus {
            conditions: Some(vec![pressure]),
            ..default()
        }),
        ..corev1::Node::new("gke-node-0")
    };
    assert!(!node.is_ready());

    let node = node.with_ready(true);
    assert!(node.is_ready());
    let conditions = node.status.and_then(|status| status.conditions).unwrap();
    assert_eq!(conditions.len(), 2);
}

#[test]
fn pod_availability() {
    let pod = corev1::Pod::new("nginx-abc123-minimal-pod", "default");
    assert!(!pod.is_available());

    let pod = pod.with_phase("Pending").with_container("nginx", false);
    assert!(!pod.is_available());

    let pod = pod.with_phase(POD_RUNNING);
    assert!(!pod.is_available());

    let pod = corev1::Pod::new("nginx-abc123-minimal-pod", "default")
        .with_phase(POD_RUNNING)
        .with_container("nginx", true)
        .with_container("sidecar", true);
    assert!(pod.is_available());
    assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));
}
