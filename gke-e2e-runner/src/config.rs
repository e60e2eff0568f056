use std::path::PathBuf;
use std::time::Duration;

use gke_e2e::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::scenario::Scenario;
use crate::stage::Stage;
use crate::stage::StageSet;

const DEFAULT_REGIONS: [&str; 6] = [
    "us-central1",
    "us-east1",
    "us-west1",
    "europe-west1",
    "europe-north1",
    "asia-southeast1",
];

/// Provision GKE clusters with Terraform and check that they come up healthy.
#[derive(Debug, clap::Parser)]
#[command(name = "gke-e2e-runner", version)]
pub(crate) struct Cli {
    /// Scenario to run, may be repeated. Runs every scenario when omitted.
    #[arg(long = "scenario", value_enum)]
    scenarios: Vec<Scenario>,

    /// GCP project the clusters are created in.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: String,

    /// Regions to pick a random one from for each scenario.
    #[arg(
        long = "region",
        env = "GKE_E2E_REGIONS",
        value_delimiter = ',',
        default_values = DEFAULT_REGIONS
    )]
    regions: Vec<String>,

    /// IAM user granted access to Tiller.
    #[arg(long, env = "GKE_E2E_IAM_USER")]
    iam_user: Option<String>,

    /// Repository holding the Terraform modules and charts.
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Stage to skip, may be repeated.
    #[arg(long, value_enum, value_delimiter = ',')]
    skip: Vec<Stage>,

    /// Persist each scenario's context here so an interrupted run can resume.
    #[arg(long, env = "GKE_E2E_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    expected_nodes: usize,

    /// Node polls before giving up.
    #[arg(long, default_value_t = 30)]
    max_attempts: u32,

    /// Pause between node polls, e.g. `10s` or `1m30s`.
    #[arg(long, default_value = "10s", value_parser = gke_e2e::parse_interval)]
    interval: Duration,

    #[arg(long, default_value = "terraform")]
    terraform_binary: String,
}

/// Everything a scenario run needs, resolved from the command line.
#[derive(Debug)]
pub(crate) struct RunConfig {
    pub(crate) scenarios: Vec<Scenario>,
    pub(crate) project: String,
    pub(crate) regions: Vec<String>,
    pub(crate) iam_user: Option<String>,
    pub(crate) repo_root: PathBuf,
    pub(crate) skip: StageSet,
    pub(crate) state_dir: Option<PathBuf>,
    pub(crate) expected_nodes: usize,
    pub(crate) terraform_binary: String,
    pub(crate) node_policy: RetryPolicy,
    pub(crate) pod_policy: RetryPolicy,
    pub(crate) cancel: CancellationToken,
}

impl Cli {
    pub(crate) fn into_config(self, cancel: CancellationToken) -> Result<RunConfig, Error> {
        let scenarios = if self.scenarios.is_empty() {
            Scenario::ALL.to_vec()
        } else {
            self.scenarios
        };
        let node_policy =
            RetryPolicy::new(self.max_attempts, self.interval)?.with_cancellation(cancel.clone());
        let pod_policy = RetryPolicy::pod_availability().with_cancellation(cancel.clone());

        Ok(RunConfig {
            scenarios,
            project: self.project,
            regions: self.regions,
            iam_user: self.iam_user,
            repo_root: self.repo_root,
            skip: self.skip.into_iter().collect(),
            state_dir: self.state_dir,
            expected_nodes: self.expected_nodes,
            terraform_binary: self.terraform_binary,
            node_policy,
            pod_policy,
            cancel,
        })
    }
}
