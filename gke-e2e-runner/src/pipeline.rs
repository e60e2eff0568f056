use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use gke_e2e::ReadinessWaiter;
use gke_e2e_kubeapi::KubeApi;
use gke_e2e_tools::Gcloud;
use gke_e2e_tools::Helm;
use gke_e2e_tools::HttpProbe;
use gke_e2e_tools::Terraform;
use rand::Rng as _;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::seq::SliceRandom as _;
use tracing::Instrument as _;

use crate::config::RunConfig;
use crate::context::ContextStore;
use crate::context::TestContext;
use crate::error::Error;
use crate::scenario;
use crate::scenario::NGINX_IMAGE;
use crate::scenario::Scenario;
use crate::scenario::Target;
use crate::stage::Stage;

const HELM_CHART: &str = "test/charts/minimal-pod";
const HELM_NAMESPACE: &str = "default";
const NGINX_PORT: u16 = 80;

/// Run every stage of `scenario`, then clean up.
///
/// Cleanup runs whether or not the other stages succeeded, unless it is
/// skipped. The first error wins.
pub(crate) async fn run_scenario(scenario: Scenario, config: &RunConfig) -> Result<(), Error> {
    let store = config.state_dir.as_deref().map(ContextStore::new);
    let context = match &store {
        Some(store) => store.load(scenario)?,
        None => TestContext::default(),
    };

    let mut pipeline = Pipeline {
        scenario,
        config,
        store,
        context,
    };
    let outcome = pipeline.run_stages().await;
    let cleanup = pipeline.cleanup().await;
    outcome.and(cleanup)
}

#[derive(Debug)]
struct Pipeline<'a> {
    scenario: Scenario,
    config: &'a RunConfig,
    store: Option<ContextStore>,
    context: TestContext,
}

impl Pipeline<'_> {
    async fn run_stages(&mut self) -> Result<(), Error> {
        for &stage in self.scenario.stages() {
            if stage == Stage::Cleanup {
                continue;
            }
            if self.config.cancel.is_cancelled() {
                return Err(Error::Interrupted(self.scenario));
            }
            if self.config.skip.contains(stage) {
                tracing::info!(%stage, "Skipping stage");
                continue;
            }
            if stage.is_one_shot() && self.context.completed.contains(stage) {
                tracing::info!(%stage, "Stage already completed");
                continue;
            }

            self.run_stage(stage)
                .instrument(tracing::info_span!("stage", %stage))
                .await?;
            self.context.completed.insert(stage);
            self.save()?;
        }
        Ok(())
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<(), Error> {
        match stage {
            Stage::CreateTestCopy => self.create_test_copy(),
            Stage::CreateOptions => self.create_options(),
            Stage::TerraformApply => {
                self.terraform(stage)?.init_and_apply().await?;
                Ok(())
            }
            Stage::ConfigureKubectl => self.configure_kubectl(stage).await,
            Stage::WaitForWorkers => self.wait_for_workers().await,
            Stage::VerifyPlanNoop => self.verify_plan_noop(stage).await,
            Stage::HelmInstall => self.helm_install().await,
            Stage::Cleanup => self.cleanup().await,
        }
    }

    fn save(&self) -> Result<(), Error> {
        match &self.store {
            Some(store) => store.save(self.scenario, &self.context),
            None => Ok(()),
        }
    }

    fn terraform(&self, stage: Stage) -> Result<Terraform, Error> {
        let terraform = Terraform::new(self.context.module_path(stage)?, self.context.vars.clone())
            .binary(&self.config.terraform_binary);
        Ok(terraform)
    }

    fn create_test_copy(&mut self) -> Result<(), Error> {
        let source = self.config.repo_root.join(self.scenario.copy_source());
        let name = format!("gke-e2e-{}-{}", self.scenario, unique_id().to_lowercase());
        let copy = gke_e2e_tools::copy_folder_to_temp(&source, &name)?;
        let module_path = match self.scenario.module_dir() {
            Some(dir) => copy.join(dir),
            None => copy.clone(),
        };

        tracing::info!(module = %module_path.display(), "Created test copy");
        self.context.module_path = Some(module_path);
        self.context.test_copy = Some(copy);
        Ok(())
    }

    fn create_options(&mut self) -> Result<(), Error> {
        let unique_id = unique_id();
        let region = choose_region(&self.config.regions)?;
        let cluster_name = scenario::cluster_name(&unique_id);
        let iam_user = match (self.scenario.needs_iam_user(), &self.config.iam_user) {
            (true, Some(iam_user)) => iam_user.as_str(),
            (true, None) => return Err(Error::NoIamUser(self.scenario)),
            (false, _) => "",
        };
        let kubeconfig = if self.scenario.uses_temp_kubeconfig() {
            let name = format!("gke-e2e-{}-{}", self.scenario, unique_id.to_lowercase());
            Some(gke_e2e_tools::copy_home_kubeconfig_to_temp(&name)?)
        } else {
            None
        };

        let target = Target {
            cluster_name: &cluster_name,
            project: &self.config.project,
            region: &region,
        };
        let vars = self.scenario.vars(target, kubeconfig.as_deref(), iam_user);

        tracing::info!(%unique_id, %region, cluster = %cluster_name, "Created options");
        self.context.vars = vars;
        self.context.kubeconfig = kubeconfig;
        self.context.project = Some(self.config.project.clone());
        self.context.region = Some(region);
        self.context.unique_id = Some(unique_id);
        Ok(())
    }

    async fn configure_kubectl(&self, stage: Stage) -> Result<(), Error> {
        Gcloud
            .get_credentials(
                self.context.cluster_name(stage)?,
                self.context.region(stage)?,
                self.context.project(stage)?,
                self.context.kubeconfig(stage)?,
            )
            .await?;
        Ok(())
    }

    async fn wait_for_workers(&self) -> Result<(), Error> {
        let api = KubeApi::connect(self.context.kubeconfig.as_deref()).await?;
        ReadinessWaiter::new(&api)
            .verify_cluster_is_ready(self.config.expected_nodes, &self.config.node_policy)
            .await?;
        Ok(())
    }

    async fn verify_plan_noop(&self, stage: Stage) -> Result<(), Error> {
        let count = self.terraform(stage)?.init_and_plan().await?;
        if count.is_noop() {
            Ok(())
        } else {
            Err(Error::PlanNotNoop(count))
        }
    }

    async fn helm_install(&self) -> Result<(), Error> {
        let (release, pod) = scenario::release_and_pod(&unique_id());
        let chart = self.config.repo_root.join(HELM_CHART);
        let values = BTreeMap::from([
            ("image".to_string(), NGINX_IMAGE.to_string()),
            ("fullnameOverride".to_string(), pod.clone()),
        ]);

        let helm = Helm::new(HELM_NAMESPACE).kubeconfig(self.context.kubeconfig.clone());
        helm.install(&chart, &release, &values).await?;
        let verified = self.verify_nginx_pod(&pod).await;
        let uninstalled = helm.uninstall(&release).await.map_err(Error::from);
        verified.and(uninstalled)
    }

    /// Wait for the pod, tunnel to it and expect the nginx welcome page.
    async fn verify_nginx_pod(&self, pod: &str) -> Result<(), Error> {
        let api = KubeApi::connect(self.context.kubeconfig.as_deref()).await?;
        api.wait_until_pod_available(HELM_NAMESPACE, pod, &self.config.pod_policy)
            .await?;

        let tunnel = api.tunnel(HELM_NAMESPACE, pod, NGINX_PORT).await?;
        let endpoint = format!("http://{}", tunnel.endpoint());
        let probed = HttpProbe::new()
            .get_with_retry(&endpoint, &self.config.pod_policy, |status, body| {
                status == 200 && body.contains("Welcome to nginx")
            })
            .await;
        tunnel.close();

        probed?;
        Ok(())
    }

    /// Destroy what Terraform created, then delete the files the run left in
    /// the temp dir and forget the run.
    ///
    /// When destroy fails everything is kept, so a later run with the same
    /// state dir can retry the cleanup.
    async fn cleanup(&mut self) -> Result<(), Error> {
        if self.config.skip.contains(Stage::Cleanup) {
            tracing::info!(stage = %Stage::Cleanup, "Skipping stage");
            return Ok(());
        }

        let span = tracing::info_span!("stage", stage = %Stage::Cleanup);
        match &self.context.module_path {
            Some(_) if !self.context.vars.is_empty() => {
                self.terraform(Stage::Cleanup)?
                    .destroy()
                    .instrument(span.clone())
                    .await?;
            }
            _ => tracing::info!(parent: &span, "Nothing to destroy"),
        }

        self.remove_run_files()?;
        match &self.store {
            Some(store) => store.remove(self.scenario),
            None => Ok(()),
        }
    }

    /// Files already gone count as removed.
    fn remove_run_files(&mut self) -> Result<(), Error> {
        if let Some(kubeconfig) = self.context.kubeconfig.take() {
            remove(&kubeconfig, fs::remove_file(&kubeconfig))?;
            if let Some(dir) = kubeconfig.parent() {
                remove(dir, fs::remove_dir_all(dir))?;
            }
        }
        if let Some(copy) = self.context.test_copy.take() {
            remove(&copy, fs::remove_dir_all(&copy))?;
            self.context.module_path = None;
        }
        Ok(())
    }
}

fn remove(path: &Path, result: io::Result<()>) -> Result<(), Error> {
    match result {
        Err(source) if source.kind() != io::ErrorKind::NotFound => Err(Error::State {
            action: "remove",
            path: path.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

/// Six random alphanumeric characters.
fn unique_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

fn choose_region(regions: &[String]) -> Result<String, Error> {
    regions.choose(&mut OsRng).cloned().ok_or(Error::NoRegion)
}
