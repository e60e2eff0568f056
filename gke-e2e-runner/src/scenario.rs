use std::fmt;
use std::path::Path;

use constcat::concat;
use gke_e2e_tools::Var;
use gke_e2e_tools::Vars;

use crate::stage::Stage;

const NGINX_VERSION: &str = "1.15.8";
pub(crate) const NGINX_IMAGE: &str = concat!("nginx:", NGINX_VERSION);

const CLUSTER_STAGES: &[Stage] = &[
    Stage::CreateTestCopy,
    Stage::CreateOptions,
    Stage::TerraformApply,
    Stage::ConfigureKubectl,
    Stage::WaitForWorkers,
    Stage::VerifyPlanNoop,
    Stage::Cleanup,
];

const HELM_STAGES: &[Stage] = &[
    Stage::CreateTestCopy,
    Stage::CreateOptions,
    Stage::TerraformApply,
    Stage::WaitForWorkers,
    Stage::HelmInstall,
    Stage::Cleanup,
];

const TILLER_STAGES: &[Stage] = &[
    Stage::CreateTestCopy,
    Stage::CreateOptions,
    Stage::TerraformApply,
    Stage::WaitForWorkers,
    Stage::Cleanup,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Scenario {
    PublicCluster,
    PrivateCluster,
    PublicClusterWithCustomSa,
    BasicHelm,
    BasicTiller,
}

/// Cluster coordinates chosen when a scenario's options are created.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Target<'a> {
    pub(crate) cluster_name: &'a str,
    pub(crate) project: &'a str,
    pub(crate) region: &'a str,
}

impl Scenario {
    pub(crate) const ALL: [Self; 5] = [
        Self::PublicCluster,
        Self::PrivateCluster,
        Self::PublicClusterWithCustomSa,
        Self::BasicHelm,
        Self::BasicTiller,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::PublicCluster => "public-cluster",
            Self::PrivateCluster => "private-cluster",
            Self::PublicClusterWithCustomSa => "public-cluster-with-custom-sa",
            Self::BasicHelm => "basic-helm",
            Self::BasicTiller => "basic-tiller",
        }
    }

    pub(crate) fn stages(self) -> &'static [Stage] {
        match self {
            Self::PublicCluster | Self::PrivateCluster | Self::PublicClusterWithCustomSa => {
                CLUSTER_STAGES
            }
            Self::BasicHelm => HELM_STAGES,
            Self::BasicTiller => TILLER_STAGES,
        }
    }

    /// Directory under the repository root that gets copied for the run.
    pub(crate) fn copy_source(self) -> &'static str {
        match self {
            Self::BasicHelm => ".",
            _ => "examples",
        }
    }

    /// The Terraform module inside the copied directory, `None` when the copy
    /// itself is the module.
    pub(crate) fn module_dir(self) -> Option<&'static str> {
        match self {
            Self::PublicCluster | Self::PublicClusterWithCustomSa => Some("gke-public-cluster"),
            Self::PrivateCluster => Some("gke-private-cluster"),
            Self::BasicHelm => None,
            Self::BasicTiller => Some("gke-basic-tiller"),
        }
    }

    /// Whether the scenario talks to the cluster through its own copy of the
    /// kubeconfig rather than the user's default one.
    pub(crate) fn uses_temp_kubeconfig(self) -> bool {
        !matches!(self, Self::BasicTiller)
    }

    pub(crate) fn needs_iam_user(self) -> bool {
        matches!(self, Self::BasicTiller)
    }

    pub(crate) fn vars(self, target: Target<'_>, kubeconfig: Option<&Path>, iam_user: &str) -> Vars {
        let mut vars = Vars::from([
            ("project".to_string(), Var::from(target.project)),
            ("region".to_string(), Var::from(target.region)),
            ("cluster_name".to_string(), Var::from(target.cluster_name)),
        ]);

        match self {
            Self::PublicCluster | Self::PrivateCluster => {}
            Self::PublicClusterWithCustomSa => {
                vars.insert(
                    "override_default_node_pool_service_account".to_string(),
                    Var::from("1"),
                );
            }
            Self::BasicHelm => {
                if let Some(kubeconfig) = kubeconfig {
                    vars.insert(
                        "kubectl_config_path".to_string(),
                        Var::from(kubeconfig.display().to_string()),
                    );
                }
            }
            Self::BasicTiller => {
                vars.extend([
                    ("iam_user".to_string(), Var::from(iam_user)),
                    (
                        "tls_subject".to_string(),
                        Var::map([("common_name", "tiller"), ("org", "Gruntwork")]),
                    ),
                    (
                        "client_tls_subject".to_string(),
                        Var::map([("common_name", iam_user), ("org", "Gruntwork")]),
                    ),
                    ("force_undeploy".to_string(), Var::from(true)),
                    ("undeploy_release".to_string(), Var::from(true)),
                ]);
            }
        }

        vars
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn cluster_name(unique_id: &str) -> String {
    format!("gke-cluster-{}", unique_id.to_lowercase())
}

/// Release name for the helm scenario and the pod name its chart produces.
pub(crate) fn release_and_pod(unique_id: &str) -> (String, String) {
    let release = format!("nginx-{}", unique_id.to_lowercase());
    let pod = format!("{release}-minimal-pod");
    (release, pod)
}
