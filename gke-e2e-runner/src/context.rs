use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use gke_e2e_tools::Vars;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::scenario::Scenario;
use crate::stage::Stage;
use crate::stage::StageSet;

/// Everything one stage hands to the next.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct TestContext {
    pub(crate) unique_id: Option<String>,
    pub(crate) project: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) test_copy: Option<PathBuf>,
    pub(crate) module_path: Option<PathBuf>,
    pub(crate) kubeconfig: Option<PathBuf>,
    #[serde(default)]
    pub(crate) vars: Vars,
    #[serde(default)]
    pub(crate) completed: StageSet,
}

impl TestContext {
    pub(crate) fn project(&self, stage: Stage) -> Result<&str, Error> {
        require(self.project.as_deref(), stage, "project")
    }

    pub(crate) fn region(&self, stage: Stage) -> Result<&str, Error> {
        require(self.region.as_deref(), stage, "region")
    }

    pub(crate) fn module_path(&self, stage: Stage) -> Result<&Path, Error> {
        require(self.module_path.as_deref(), stage, "terraform module path")
    }

    pub(crate) fn kubeconfig(&self, stage: Stage) -> Result<&Path, Error> {
        require(self.kubeconfig.as_deref(), stage, "kubeconfig path")
    }

    pub(crate) fn cluster_name(&self, stage: Stage) -> Result<&str, Error> {
        let name = self.vars.get("cluster_name").and_then(|var| var.as_str());
        require(name, stage, "cluster name")
    }
}

fn require<'a, T: ?Sized>(
    value: Option<&'a T>,
    stage: Stage,
    field: &'static str,
) -> Result<&'a T, Error> {
    value.ok_or(Error::MissingContext { stage, field })
}

/// Saves each scenario's context as `<dir>/<scenario>.json`.
#[derive(Clone, Debug)]
pub(crate) struct ContextStore {
    dir: PathBuf,
}

impl ContextStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, scenario: Scenario) -> PathBuf {
        self.dir.join(format!("{scenario}.json"))
    }

    /// The saved context, or an empty one when nothing was saved yet.
    pub(crate) fn load(&self, scenario: Scenario) -> Result<TestContext, Error> {
        let path = self.path(scenario);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(TestContext::default()),
            Err(source) => return Err(Error::State { action: "read", path, source }),
        };
        let context = serde_json::from_str(&text)
            .map_err(|source| Error::StateFormat { path: path.clone(), source })?;
        tracing::info!(%scenario, path = %path.display(), "Loaded saved context");
        Ok(context)
    }

    pub(crate) fn save(&self, scenario: Scenario, context: &TestContext) -> Result<(), Error> {
        let path = self.path(scenario);
        fs::create_dir_all(&self.dir).map_err(|source| Error::State {
            action: "create",
            path: self.dir.clone(),
            source,
        })?;
        let text = serde_json::to_string_pretty(context)
            .map_err(|source| Error::StateFormat { path: path.clone(), source })?;
        fs::write(&path, text).map_err(|source| Error::State { action: "write", path, source })
    }

    pub(crate) fn remove(&self, scenario: Scenario) -> Result<(), Error> {
        let path = self.path(scenario);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::State { action: "remove", path, source }),
        }
    }
}
