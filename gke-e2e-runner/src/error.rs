use std::io;
use std::path::PathBuf;

use gke_e2e_tools::ResourceCount;

use crate::scenario::Scenario;
use crate::stage::Stage;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Readiness(#[from] gke_e2e::Error),

    #[error(transparent)]
    Kube(#[from] gke_e2e_kubeapi::Error),

    #[error(transparent)]
    Tool(#[from] gke_e2e_tools::Error),

    #[error("invalid retry policy")]
    Policy(#[from] gke_e2e::ZeroAttempts),

    #[error("stage {stage} needs the {field}, which no earlier stage recorded")]
    MissingContext { stage: Stage, field: &'static str },

    #[error("no regions to choose from")]
    NoRegion,

    #[error("scenario {0} needs an IAM user (--iam-user or GKE_E2E_IAM_USER)")]
    NoIamUser(Scenario),

    #[error("terraform plan is not a no-op: {0}")]
    PlanNotNoop(ResourceCount),

    #[error("failed to {action} {}", path.display())]
    State {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed state file {}", path.display())]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario {0} was interrupted")]
    Interrupted(Scenario),
}
