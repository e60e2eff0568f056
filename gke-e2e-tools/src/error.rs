use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use gke_e2e::RetryError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to run {tool}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("no resource summary in terraform plan output")]
    PlanSummary,

    #[error("failed to copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("probe of {url} failed")]
    Probe {
        url: String,
        #[source]
        source: RetryError<String>,
    },
}
