use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const LOG_DIR_NAME: &str = "tank-installer";

/// Resolve and create the log folder.
///
/// An explicit override wins; otherwise the platform data directory, then the
/// directory of the running executable.
pub fn resolve_log_folder(override_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_folder(),
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log folder {}", dir.display()))?;
    Ok(dir)
}

fn default_log_folder() -> PathBuf {
    if let Some(data) = dirs::data_local_dir() {
        return data.join(LOG_DIR_NAME).join("logs");
    }

    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_is_created_and_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = tmp.path().join("nested").join("logs");

        let resolved = resolve_log_folder(Some(&wanted)).unwrap();

        assert_eq!(resolved, wanted);
        assert!(wanted.is_dir());
    }

    #[test]
    fn default_folder_is_named_for_the_installer() {
        let dir = default_log_folder();
        assert!(dir.ends_with("logs"));
    }
}
