use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::path::Path;

use gke_e2e::NodeLister;
use gke_e2e::NodeView;
use gke_e2e::RetryPolicy;
use gke_e2e_ext as k8s;
use kube::api;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use tokio::net::TcpListener;

use k8s::NodeExt as _;
use k8s::PodExt as _;
use k8s::corev1;

pub use error::Error;
pub use tunnel::Tunnel;

mod error;
mod tunnel;

pub struct KubeApi {
    list_params: api::ListParams,
    client: kube::Client,
}

impl KubeApi {
    /// Create a KubeApi configured with the default Kubernetes client.
    ///
    /// The configuration is inferred the usual way: `KUBECONFIG`,
    /// `~/.kube/config`, then the in-cluster service account.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), gke_e2e_kubeapi::Error> {
    /// let api = gke_e2e_kubeapi::KubeApi::new().await?;
    /// // use `api`...
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new() -> Result<Self, Error> {
        let client = kube::Client::try_default().await?;
        Ok(Self::with_client(client))
    }

    /// Create a KubeApi from the kubeconfig file at `path`, using its current
    /// context.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), gke_e2e_kubeapi::Error> {
    /// let path = std::path::Path::new("/tmp/gke-e2e-abc123/kubeconfig");
    /// let api = gke_e2e_kubeapi::KubeApi::from_kubeconfig(path).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_kubeconfig(path: &Path) -> Result<Self, Error> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|source| Error::Kubeconfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|source| Error::Kubeconfig {
                path: path.to_path_buf(),
                source,
            })?;
        let client = kube::Client::try_from(config)?;
        Ok(Self::with_client(client))
    }

    /// Use the kubeconfig at `path` when given, the default client otherwise.
    pub async fn connect(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::from_kubeconfig(path).await,
            None => Self::new().await,
        }
    }

    /// Create a KubeApi backed by the provided Kubernetes client.
    pub fn with_client(client: kube::Client) -> Self {
        Self {
            list_params: api::ListParams::default(),
            client,
        }
    }

    /// Fetch a single Pod.
    pub async fn get_pod(&self, namespace: &str, name: &str) -> kube::Result<corev1::Pod> {
        self.pods(namespace).get(name).await
    }

    /// Poll the Pod until it is running with all containers ready.
    ///
    /// Errors while fetching the Pod (for instance because it has not been
    /// created yet) count as "not available" and are retried.
    pub async fn wait_until_pod_available(
        &self,
        namespace: &str,
        name: &str,
        policy: &RetryPolicy,
    ) -> Result<(), Error> {
        let description = format!("pod {namespace}/{name} to be available");
        gke_e2e::retry(policy, &description, move || async move {
            let pod = self
                .get_pod(namespace, name)
                .await
                .map_err(|err| err.to_string())?;
            if pod.is_available() {
                Ok(())
            } else {
                Err(format!("pod {namespace}/{name} is not available yet"))
            }
        })
        .await
        .map_err(|source| Error::PodUnavailable {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

        tracing::info!(namespace, name, "Pod is available");
        Ok(())
    }

    /// Open a local tunnel to `port` of the given Pod.
    ///
    /// The tunnel listens on an ephemeral port on 127.0.0.1 and stays open
    /// until [`Tunnel::close`] is called or it is dropped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn run(api: &gke_e2e_kubeapi::KubeApi) -> Result<(), gke_e2e_kubeapi::Error> {
    /// let tunnel = api.tunnel("default", "nginx-minimal-pod", 80).await?;
    /// let url = format!("http://{}", tunnel.endpoint());
    /// tunnel.close();
    /// # Ok(())
    /// # }
    /// ```
    pub async fn tunnel(&self, namespace: &str, pod: &str, port: u16) -> Result<Tunnel, Error> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(Error::Tunnel)?;
        Tunnel::open(listener, self.pods(namespace), pod, port)
    }

    fn nodes(&self) -> api::Api<corev1::Node> {
        api::Api::all(self.client.clone())
    }

    fn pods(&self, namespace: &str) -> api::Api<corev1::Pod> {
        api::Api::namespaced(self.client.clone(), namespace)
    }

    fn list_params(&self) -> &api::ListParams {
        &self.list_params
    }
}

impl NodeLister for KubeApi {
    type Error = kube::Error;

    /// Lists every Node in the cluster and reduces each to its name and
    /// `Ready` condition.
    async fn list_nodes(&self) -> kube::Result<Vec<NodeView>> {
        let lp = self.list_params();
        let nodes = self.nodes().list(lp).await?;
        Ok(nodes.items.iter().map(|node| node.node_view()).collect())
    }
}

impl Debug for KubeApi {
    /// Formats the `KubeApi` for debugging, showing `list_params` while
    /// redacting the `client`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApi")
            .field("list_params", &self.list_params)
            .field("client", &"<kube::Client>")
            .finish()
    }
}
