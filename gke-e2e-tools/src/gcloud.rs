use std::path::Path;

use tokio::process::Command;

use crate::Error;
use crate::command;

#[derive(Clone, Debug, Default)]
pub struct Gcloud;

impl Gcloud {
    /// Write credentials for `cluster` into `kubeconfig` and make it the
    /// current context there.
    pub async fn get_credentials(
        &self,
        cluster: &str,
        region: &str,
        project: &str,
        kubeconfig: &Path,
    ) -> Result<(), Error> {
        let mut command = Command::new("gcloud");
        command
            .args(get_credentials_args(cluster, region, project))
            .env("KUBECONFIG", kubeconfig);
        command::run("gcloud", &mut command).await?;
        tracing::info!(cluster, region, project, kubeconfig = %kubeconfig.display(), "Fetched cluster credentials");
        Ok(())
    }
}

fn get_credentials_args(cluster: &str, region: &str, project: &str) -> [String; 9] {
    [
        "beta",
        "container",
        "clusters",
        "get-credentials",
        cluster,
        "--region",
        region,
        "--project",
        project,
    ]
    .map(str::to_string)
}
