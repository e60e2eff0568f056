use std::time::Duration;

use gke_e2e::RetryPolicy;

use crate::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Repeated HTTP GETs until the response passes a caller-supplied check.
#[derive(Clone, Debug, Default)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// GET `url` until `validate(status, body)` holds, returning the body of
    /// the accepted response. Connection errors count as failed attempts.
    pub async fn get_with_retry<V>(
        &self,
        url: &str,
        policy: &RetryPolicy,
        validate: V,
    ) -> Result<String, Error>
    where
        V: Fn(u16, &str) -> bool,
    {
        let client = &self.client;
        let validate = &validate;
        let description = format!("GET {url}");

        gke_e2e::retry(policy, &description, move || async move {
            let response = client
                .get(url)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|err| err.to_string())?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|err| err.to_string())?;
            if validate(status, &body) {
                Ok(body)
            } else {
                Err(format!("unexpected response: status {status}"))
            }
        })
        .await
        .map_err(|source| Error::Probe {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use gke_e2e::RetryError;

    use super::*;

    const WELCOME: &str = "<h1>Welcome to nginx!</h1>";

    /// Serves `WELCOME`, but only from the `healthy_after`-th request on.
    async fn serve(healthy_after: usize) -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/",
                get(
                    move |State(hits): State<Arc<AtomicUsize>>| async move {
                        if hits.fetch_add(1, Ordering::SeqCst) + 1 >= healthy_after {
                            (StatusCode::OK, WELCOME)
                        } else {
                            (StatusCode::SERVICE_UNAVAILABLE, "starting")
                        }
                    },
                ),
            )
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (addr, hits)
    }

    fn nginx_welcome(status: u16, body: &str) -> bool {
        status == 200 && body.contains("Welcome to nginx")
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn accepts_first_valid_response() {
        let (addr, hits) = serve(1).await;

        let body = HttpProbe::new()
            .get_with_retry(&format!("http://{addr}"), &policy(3), nginx_welcome)
            .await
            .unwrap();

        assert_eq!(body, WELCOME);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_valid() {
        let (addr, hits) = serve(3).await;

        HttpProbe::new()
            .get_with_retry(&format!("http://{addr}"), &policy(5), nginx_welcome)
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (addr, hits) = serve(usize::MAX).await;

        let err = HttpProbe::new()
            .get_with_retry(&format!("http://{addr}"), &policy(2), nginx_welcome)
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        match err {
            Error::Probe {
                source: RetryError::Exhausted { attempts, last },
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "unexpected response: status 503");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn connection_errors_are_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpProbe::new()
            .get_with_retry(&format!("http://{addr}"), &policy(2), nginx_welcome)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Probe {
                source: RetryError::Exhausted { attempts: 2, .. },
                ..
            }
        ));
    }
}
