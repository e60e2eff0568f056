use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// One step of a scenario. Stages run in declaration order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    clap::ValueEnum,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Stage {
    CreateTestCopy,
    CreateOptions,
    TerraformApply,
    ConfigureKubectl,
    WaitForWorkers,
    VerifyPlanNoop,
    HelmInstall,
    Cleanup,
}

impl Stage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CreateTestCopy => "create-test-copy",
            Self::CreateOptions => "create-options",
            Self::TerraformApply => "terraform-apply",
            Self::ConfigureKubectl => "configure-kubectl",
            Self::WaitForWorkers => "wait-for-workers",
            Self::VerifyPlanNoop => "verify-plan-noop",
            Self::HelmInstall => "helm-install",
            Self::Cleanup => "cleanup",
        }
    }

    /// Stages whose effect outlives the process. With a state dir, a later
    /// run picks up after them instead of repeating them.
    pub(crate) fn is_one_shot(self) -> bool {
        matches!(
            self,
            Self::CreateTestCopy | Self::CreateOptions | Self::TerraformApply | Self::ConfigureKubectl
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct StageSet(BTreeSet<Stage>);

impl StageSet {
    pub(crate) fn contains(&self, stage: Stage) -> bool {
        self.0.contains(&stage)
    }

    pub(crate) fn insert(&mut self, stage: Stage) {
        self.0.insert(stage);
    }
}

impl FromIterator<Stage> for StageSet {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
