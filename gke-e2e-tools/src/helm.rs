use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use tokio::process::Command;

use crate::Error;
use crate::command;

/// Helm scoped to one namespace of one cluster.
#[derive(Clone, Debug)]
pub struct Helm {
    kubeconfig: Option<PathBuf>,
    namespace: String,
}

impl Helm {
    pub fn new(namespace: impl ToString) -> Self {
        Self {
            kubeconfig: None,
            namespace: namespace.to_string(),
        }
    }

    /// Talk to the cluster in `kubeconfig` instead of helm's default.
    pub fn kubeconfig(self, kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig, ..self }
    }

    /// `helm install <release> <chart>` with `--set` for every value.
    pub async fn install(
        &self,
        chart: &Path,
        release: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        self.run(self.install_args(chart, release, values)).await?;
        tracing::info!(release, chart = %chart.display(), namespace = %self.namespace, "Installed chart");
        Ok(())
    }

    pub async fn uninstall(&self, release: &str) -> Result<(), Error> {
        self.run(self.uninstall_args(release)).await?;
        tracing::info!(release, namespace = %self.namespace, "Uninstalled release");
        Ok(())
    }

    fn install_args(
        &self,
        chart: &Path,
        release: &str,
        values: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            release.to_string(),
            chart.display().to_string(),
        ];
        args.extend(self.common_args());
        for (name, value) in values {
            args.push("--set".to_string());
            args.push(format!("{name}={value}"));
        }
        args
    }

    fn uninstall_args(&self, release: &str) -> Vec<String> {
        let mut args = vec!["uninstall".to_string(), release.to_string()];
        args.extend(self.common_args());
        args
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--namespace".to_string(), self.namespace.clone()];
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<String, Error> {
        let mut command = Command::new("helm");
        command.args(args);
        command::run("helm", &mut command).await
    }
}
