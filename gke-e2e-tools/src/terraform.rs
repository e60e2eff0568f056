use std::collections::BTreeMap;
use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use tokio::process::Command;

use crate::Error;
use crate::command;

static PLAN_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Plan: (?:\d+ to import, )?(\d+) to add, (\d+) to change, (\d+) to destroy")
        .expect("plan summary regex")
});

const NO_CHANGES: &str = "No changes.";

pub type Vars = BTreeMap<String, Var>;

/// A Terraform input variable value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Var {
    Bool(bool),
    String(String),
    Map(BTreeMap<String, String>),
}

impl Var {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: ToString,
        V: ToString,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self::Map(entries)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Bool(_) | Self::Map(_) => None,
        }
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Var {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Var {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Renders the value the way `-var name=value` expects it: strings raw,
/// maps as HCL object literals.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", quote(key), quote(value))?;
                }
                f.write_str("}")
            }
        }
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Resource counts from the summary line of `terraform plan`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCount {
    pub add: u32,
    pub change: u32,
    pub destroy: u32,
}

impl ResourceCount {
    /// Nothing would be added or changed. Pending destroys are not counted.
    pub fn is_noop(&self) -> bool {
        self.add == 0 && self.change == 0
    }
}

impl FromStr for ResourceCount {
    type Err = Error;

    fn from_str(output: &str) -> Result<Self, Self::Err> {
        if let Some(captures) = PLAN_SUMMARY.captures(output) {
            let count = |index: usize| -> Result<u32, Error> {
                captures[index].parse().map_err(|_| Error::PlanSummary)
            };
            return Ok(Self {
                add: count(1)?,
                change: count(2)?,
                destroy: count(3)?,
            });
        }

        if output.contains(NO_CHANGES) {
            return Ok(Self::default());
        }

        Err(Error::PlanSummary)
    }
}

impl fmt::Display for ResourceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

/// A Terraform module together with the variables to run it with.
#[derive(Clone, Debug)]
pub struct Terraform {
    binary: String,
    dir: PathBuf,
    vars: Vars,
}

impl Terraform {
    pub fn new(dir: impl Into<PathBuf>, vars: Vars) -> Self {
        Self {
            binary: "terraform".to_string(),
            dir: dir.into(),
            vars,
        }
    }

    /// Use a different executable, e.g. `tofu`.
    pub fn binary(self, binary: impl ToString) -> Self {
        Self {
            binary: binary.to_string(),
            ..self
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `terraform init` followed by `terraform apply -auto-approve`.
    pub async fn init_and_apply(&self) -> Result<String, Error> {
        self.run(&self.init_args()).await?;
        let output = self.run(&self.apply_args()).await?;
        tracing::info!(dir = %self.dir.display(), "Terraform apply complete");
        Ok(output)
    }

    /// `terraform init` followed by `terraform plan`, returning the counts
    /// from the plan summary.
    pub async fn init_and_plan(&self) -> Result<ResourceCount, Error> {
        self.run(&self.init_args()).await?;
        let count = self.run(&self.plan_args()).await?.parse()?;
        tracing::info!(dir = %self.dir.display(), %count, "Terraform plan complete");
        Ok(count)
    }

    pub async fn destroy(&self) -> Result<String, Error> {
        let output = self.run(&self.destroy_args()).await?;
        tracing::info!(dir = %self.dir.display(), "Terraform destroy complete");
        Ok(output)
    }

    fn init_args(&self) -> Vec<String> {
        strings(["init", "-upgrade=false", "-input=false", "-no-color"])
    }

    fn apply_args(&self) -> Vec<String> {
        let mut args = strings(["apply", "-input=false", "-auto-approve", "-lock=false", "-no-color"]);
        args.extend(self.var_args());
        args
    }

    fn plan_args(&self) -> Vec<String> {
        let mut args = strings(["plan", "-input=false", "-lock=false", "-no-color"]);
        args.extend(self.var_args());
        args
    }

    fn destroy_args(&self) -> Vec<String> {
        let mut args = strings(["destroy", "-auto-approve", "-input=false", "-lock=false", "-no-color"]);
        args.extend(self.var_args());
        args
    }

    fn var_args(&self) -> impl Iterator<Item = String> + '_ {
        self.vars
            .iter()
            .flat_map(|(name, value)| ["-var".to_string(), format!("{name}={value}")])
    }

    async fn run(&self, args: &[String]) -> Result<String, Error> {
        let mut command = Command::new(&self.binary);
        command
            .current_dir(&self.dir)
            .env("TF_IN_AUTOMATION", "1")
            .args(args);
        command::run("terraform", &mut command).await
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Copy the Terraform tree at `root` into a fresh directory named `name`
/// under the system temp dir, leaving out hidden entries and local state.
pub fn copy_folder_to_temp(root: &Path, name: &str) -> Result<PathBuf, Error> {
    let destination = env::temp_dir().join(name);
    copy_dir(root, &destination)?;
    tracing::info!(from = %root.display(), to = %destination.display(), "Copied terraform folder");
    Ok(destination)
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), Error> {
    let copy_error = |source| Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::create_dir_all(to).map_err(copy_error)?;
    for entry in fs::read_dir(from).map_err(copy_error)? {
        let entry = entry.map_err(copy_error)?;
        let name = entry.file_name();
        if is_skipped(&name) {
            continue;
        }

        let source = entry.path();
        let target = to.join(&name);
        if entry.file_type().map_err(copy_error)?.is_dir() {
            copy_dir(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|err| Error::Copy {
                from: source.clone(),
                to: target.clone(),
                source: err,
            })?;
        }
    }

    Ok(())
}

fn is_skipped(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with("terraform.tfstate")
}
