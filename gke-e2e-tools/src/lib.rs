//! Thin adapters over the external tools a GKE end-to-end run drives.
//!
//! None of these own any provisioning logic: they build command lines, run
//! the tool, and turn failures into [`Error`]s.

pub use error::Error;
pub use gcloud::Gcloud;
pub use helm::Helm;
pub use kubeconfig::copy_home_kubeconfig_to_temp;
pub use probe::HttpProbe;
pub use terraform::ResourceCount;
pub use terraform::Terraform;
pub use terraform::Var;
pub use terraform::Vars;
pub use terraform::copy_folder_to_temp;

mod command;
mod error;
mod gcloud;
mod helm;
mod kubeconfig;
mod probe;
mod terraform;
