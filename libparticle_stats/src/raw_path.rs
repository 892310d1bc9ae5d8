//! Locating the EPU raw data from a cryoSPARC project.
//!
//! cryoSPARC keeps the raw data directory of a workspace in `workspaces.json` at the
//! project level (`file_engine_watch_path_abs`). That directory usually only holds
//! symlinks to the movies, so the acquisition root is recovered by following the first
//! symlink back to the directory above its `GridSquare_*` folder.
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

use super::constants::GRID_SQUARE_PREFIX;
use super::error::RawPathError;

const JOB_FILE: &str = "job.json";
const WORKSPACES_FILE: &str = "workspaces.json";
const WORKSPACE_UIDS_KEY: &str = "workspace_uids";
const UID_KEY: &str = "uid";
const WATCH_PATH_KEY: &str = "file_engine_watch_path_abs";

fn read_json(path: &Path) -> Result<Value, RawPathError> {
    if !path.exists() {
        return Err(RawPathError::BadFilePath(path.to_path_buf()));
    }
    let json_str = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json_str)?)
}

/// Collect (uid, watch path) from every object in the document which has a watch path
fn collect_watch_paths(value: &Value, found: &mut Vec<(Option<String>, String)>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(path)) = map.get(WATCH_PATH_KEY) {
                let uid = map
                    .get(UID_KEY)
                    .and_then(|u| u.as_str())
                    .map(|u| u.to_string());
                found.push((uid, path.clone()));
            }
            for child in map.values() {
                collect_watch_paths(child, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_watch_paths(child, found);
            }
        }
        _ => (),
    }
}

/// Find the raw data path of the workspace a cryoSPARC job belongs to.
///
/// If the project only has one watch path it is used directly, otherwise the one of the
/// job's first workspace is chosen.
pub fn locate_raw_data_path(job_dir: &Path) -> Result<PathBuf, RawPathError> {
    let job = read_json(&job_dir.join(JOB_FILE))?;
    let workspace_uid = job
        .get(WORKSPACE_UIDS_KEY)
        .and_then(|uids| uids.as_array())
        .and_then(|uids| uids.first())
        .and_then(|uid| uid.as_str())
        .map(|uid| uid.to_string());

    let workspaces = read_json(&job_dir.join("..").join(WORKSPACES_FILE))?;
    let mut watch_paths = Vec::new();
    collect_watch_paths(&workspaces, &mut watch_paths);

    if watch_paths.len() == 1 {
        let path = PathBuf::from(&watch_paths[0].1);
        log::info!("Automatically determined raw data path: {}", path.display());
        return Ok(path);
    }

    let workspace_uid = workspace_uid.ok_or(RawPathError::NoWorkspaceUid)?;
    match watch_paths
        .into_iter()
        .find(|(uid, _)| uid.as_deref() == Some(workspace_uid.as_str()))
    {
        Some((_, path)) => {
            let path = PathBuf::from(path);
            log::info!("Automatically determined raw data path: {}", path.display());
            Ok(path)
        }
        None => Err(RawPathError::NoWatchPath(workspace_uid)),
    }
}

/// Resolve the acquisition root (the directory holding the GridSquare folders).
///
/// If the first entry of `path` is a symlink, the link is followed and the root is the
/// part of its target before the first GridSquare component. Otherwise `path` already
/// is the root.
pub fn resolve_true_root(path: &Path) -> Result<PathBuf, RawPathError> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for item in path.read_dir()? {
        entries.push(item?.path());
    }
    entries.sort();
    let Some(first) = entries.first() else {
        return Err(RawPathError::EmptyDirectory(path.to_path_buf()));
    };

    if !first.symlink_metadata()?.file_type().is_symlink() {
        return Ok(path.to_path_buf());
    }

    let target = std::fs::canonicalize(first)?;
    let mut root = PathBuf::new();
    for component in target.components() {
        if let Component::Normal(name) = component {
            if name.to_string_lossy().starts_with(GRID_SQUARE_PREFIX) {
                log::info!("Resolved raw data root: {}", root.display());
                return Ok(root);
            }
        }
        root.push(component);
    }

    log::warn!(
        "Symlink {} does not point into a {} directory; using {} as the raw data root",
        first.display(),
        GRID_SQUARE_PREFIX,
        path.display()
    );
    Ok(path.to_path_buf())
}
