use std::io;
use std::path::PathBuf;

use gke_e2e::RetryError;
use kube::config::KubeconfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load kubeconfig {}", path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("pod {namespace}/{name} did not become available")]
    PodUnavailable {
        namespace: String,
        name: String,
        #[source]
        source: RetryError<String>,
    },

    #[error("failed to open tunnel listener")]
    Tunnel(#[source] io::Error),
}
