use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;

/// Copy `~/.kube/config` into `<temp>/<name>/kubeconfig` so a run can add
/// contexts without touching the user's own file.
///
/// An empty file is created when there is no home kubeconfig.
pub fn copy_home_kubeconfig_to_temp(name: &str) -> Result<PathBuf, Error> {
    let home = env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"));
    copy_kubeconfig(home.as_deref(), &env::temp_dir().join(name))
}

fn copy_kubeconfig(source: Option<&Path>, dir: &Path) -> Result<PathBuf, Error> {
    let destination = dir.join("kubeconfig");
    let copy_error = |from: &Path, source| Error::Copy {
        from: from.to_path_buf(),
        to: destination.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(|err| copy_error(dir, err))?;
    match source.filter(|source| source.is_file()) {
        Some(source) => {
            fs::copy(source, &destination).map_err(|err| copy_error(source, err))?;
        }
        None => {
            fs::write(&destination, "").map_err(|err| copy_error(dir, err))?;
        }
    }

    tracing::debug!(kubeconfig = %destination.display(), "Created temporary kubeconfig");
    Ok(destination)
}
