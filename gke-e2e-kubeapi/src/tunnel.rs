use std::future::Future;
use std::net::SocketAddr;

use kube::api;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;

use super::Error;
use super::corev1;

/// A local endpoint forwarding to a port of a single Pod.
///
/// Each accepted connection gets its own port-forward session through the
/// API server. Closing the tunnel also ends the open sessions.
#[derive(Debug)]
pub struct Tunnel {
    endpoint: SocketAddr,
    task: JoinHandle<()>,
}

impl Tunnel {
    pub(crate) fn open(
        listener: TcpListener,
        pods: api::Api<corev1::Pod>,
        pod: &str,
        port: u16,
    ) -> Result<Self, Error> {
        let target = pod.to_string();
        let tunnel = Self::serve(listener, move |mut connection| {
            let pods = pods.clone();
            let pod = target.clone();
            async move {
                if let Err(err) = forward(&mut connection, &pods, &pod, port).await {
                    tracing::warn!(%pod, ?err, "Tunnel connection failed");
                }
            }
        })?;
        tracing::info!(endpoint = %tunnel.endpoint, %pod, port, "Opened tunnel");
        Ok(tunnel)
    }

    fn serve<F, Fut>(listener: TcpListener, handle: F) -> Result<Self, Error>
    where
        F: Fn(TcpStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let endpoint = listener.local_addr().map_err(Error::Tunnel)?;
        let task = tokio::spawn(accept(listener, handle));
        Ok(Self { endpoint, task })
    }

    /// Local address to connect to, e.g. `127.0.0.1:41273`.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Stop accepting connections and drop the open ones.
    pub fn close(&self) {
        if !self.task.is_finished() {
            tracing::info!(endpoint = %self.endpoint, "Closing tunnel");
        }
        self.task.abort();
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connection tasks live in a `JoinSet` owned by this task, so aborting it
/// aborts them too.
async fn accept<F, Fut>(listener: TcpListener, handle: F)
where
    F: Fn(TcpStream) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((connection, peer)) => {
                    tracing::debug!(%peer, "Tunnel connection accepted");
                    connections.spawn(handle(connection));
                }
                Err(err) => {
                    tracing::error!(?err, "Tunnel listener failed");
                    return;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn forward(
    connection: &mut TcpStream,
    pods: &api::Api<corev1::Pod>,
    pod: &str,
    port: u16,
) -> Result<(), Error> {
    let mut forwarder = pods.portforward(pod, &[port]).await?;
    let Some(mut upstream) = forwarder.take_stream(port) else {
        tracing::warn!(pod, port, "Port-forward returned no stream");
        return Ok(());
    };
    let (sent, received) = tokio::io::copy_bidirectional(connection, &mut upstream)
        .await
        .map_err(Error::Tunnel)?;
    tracing::debug!(pod, port, sent, received, "Tunnel connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncReadExt as _;
    use tokio::io::AsyncWriteExt as _;
    use tokio::sync::mpsc;

    use super::*;

    async fn listener() -> TcpListener {
        TcpListener::bind(("127.0.0.1", 0)).await.unwrap()
    }

    #[tokio::test]
    async fn connections_reach_the_handler() {
        let tunnel = Tunnel::serve(listener().await, |mut connection| async move {
            let (mut read, mut write) = connection.split();
            tokio::io::copy(&mut read, &mut write).await.ok();
        })
        .unwrap();

        let mut client = TcpStream::connect(tunnel.endpoint()).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut echoed = [0; 4];
        client.read_exact(&mut echoed).await.unwrap();

        assert_eq!(&echoed, b"ping");
        tunnel.close();
    }

    #[tokio::test]
    async fn close_ends_open_connections() {
        let (tx, mut rx) = mpsc::channel(1);
        let tunnel = Tunnel::serve(listener().await, move |_connection| {
            let tx = tx.clone();
            async move {
                tx.send(()).await.ok();
                std::future::pending::<()>().await;
            }
        })
        .unwrap();

        let _client = TcpStream::connect(tunnel.endpoint()).await.unwrap();
        assert_eq!(rx.recv().await, Some(()));

        tunnel.close();

        let ended = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(ended, Ok(None));
    }
}
