pub use k8s_openapi as openapi;
pub use k8s_openapi::api::core::v1 as corev1;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

use gke_e2e::NodeView;

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";
pub const POD_RUNNING: &str = "Running";

pub trait NodeExt {
    fn new(name: impl ToString) -> Self;
    fn with_ready(self, ready: bool) -> Self;
    fn is_ready(&self) -> bool;
    fn node_view(&self) -> NodeView;
}

impl NodeExt for corev1::Node {
    fn new(name: impl ToString) -> Self {
        let metadata = metav1::ObjectMeta::new(name);
        Self {
            metadata,
            ..default()
        }
    }

    /// Replace the node's `Ready` condition, keeping every other condition.
    fn with_ready(self, ready: bool) -> Self {
        let status = if ready { CONDITION_TRUE } else { CONDITION_FALSE };
        let ready = corev1::NodeCondition {
            type_: CONDITION_READY.to_string(),
            status: status.to_string(),
            ..default()
        };
        let mut node_status = self.status.unwrap_or_default();
        let mut conditions = node_status.conditions.unwrap_or_default();
        conditions.retain(|condition| condition.type_ != CONDITION_READY);
        conditions.push(ready);
        node_status.conditions = Some(conditions);
        Self {
            status: Some(node_status),
            ..self
        }
    }

    /// A node is ready when it reports a `Ready` condition with status `True`.
    /// Nodes without status or without that condition are not ready.
    fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .into_iter()
            .flatten()
            .any(|condition| condition.type_ == CONDITION_READY && condition.status == CONDITION_TRUE)
    }

    fn node_view(&self) -> NodeView {
        let identifier = self.metadata.name.clone().unwrap_or_default();
        NodeView::new(identifier, self.is_ready())
    }
}

pub trait PodExt {
    fn new(name: impl ToString, namespace: impl ToString) -> Self;
    fn with_phase(self, phase: impl ToString) -> Self;
    fn with_container(self, name: impl ToString, ready: bool) -> Self;
    fn is_available(&self) -> bool;
}

impl PodExt for corev1::Pod {
    fn new(name: impl ToString, namespace: impl ToString) -> Self {
        let metadata = metav1::ObjectMeta::with_namespace(name, namespace);
        Self {
            metadata,
            ..default()
        }
    }

    fn with_phase(self, phase: impl ToString) -> Self {
        let status = corev1::PodStatus {
            phase: Some(phase.to_string()),
            ..self.status.unwrap_or_default()
        };
        Self {
            status: Some(status),
            ..self
        }
    }

    fn with_container(self, name: impl ToString, ready: bool) -> Self {
        let container = corev1::ContainerStatus {
            name: name.to_string(),
            ready,
            ..default()
        };
        let mut status = self.status.unwrap_or_default();
        status
            .container_statuses
            .get_or_insert_with(Vec::new)
            .push(container);
        Self {
            status: Some(status),
            ..self
        }
    }

    /// A pod is available once it is `Running` and all of its containers
    /// report ready.
    fn is_available(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        status.phase.as_deref() == Some(POD_RUNNING)
            && status
                .container_statuses
                .iter()
                .flatten()
                .all(|container| container.ready)
    }
}

pub trait ObjectMetaExt {
    fn new(name: impl ToString) -> Self;
    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self;
}

impl ObjectMetaExt for metav1::ObjectMeta {
    fn new(name: impl ToString) -> Self {
        let name = Some(name.to_string());
        Self { name, ..default() }
    }

    fn with_namespace(name: impl ToString, namespace: impl ToString) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::new(name)
        }
    }
}

pub fn default<T: Default>() -> T {
    T::default()
}

#[cfg(test)]
mod tests;
