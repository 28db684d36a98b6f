//! Fixed on-disk layout of a Sidetrek project

use crate::config::{ConfigError, ProjectConfig, PROJECT_CONFIG_FILENAME};
use std::path::{Path, PathBuf};

/// Project that `CUSTOM_ENV=development` points the dev server at
pub const TEST_PROJECT_NAME: &str = "test_proj";

/// Resolve the project root.
///
/// In development (`CUSTOM_ENV=development`) the server runs from the
/// repository checkout, so the root is the sibling test project.
pub fn resolve_root(cwd: &Path, custom_env: Option<&str>) -> PathBuf {
    match custom_env {
        Some("development") => cwd.join("..").join(TEST_PROJECT_NAME),
        _ => cwd.to_path_buf(),
    }
}

/// Paths derived from the project root and project name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub project_name: String,
    pub dbt_project_dir: PathBuf,
    pub models_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl ProjectLayout {
    /// Read sidetrek.config.yaml under `root` and derive the layout
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let config = ProjectConfig::from_file(&root.join(PROJECT_CONFIG_FILENAME))?;
        Ok(Self::new(root, config.project_name()))
    }

    /// `<root>/<name>/dbt/<name>` with `models/` and `target/manifest.json` under it
    pub fn new(root: &Path, project_name: &str) -> Self {
        let dbt_project_dir = root.join(project_name).join("dbt").join(project_name);
        let models_dir = dbt_project_dir.join("models");
        let manifest_path = dbt_project_dir.join("target").join("manifest.json");

        Self {
            root: root.to_path_buf(),
            project_name: project_name.to_string(),
            dbt_project_dir,
            models_dir,
            manifest_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = ProjectLayout::new(Path::new("/work/acme"), "acme");
        assert_eq!(layout.dbt_project_dir, PathBuf::from("/work/acme/acme/dbt/acme"));
        assert_eq!(layout.models_dir, PathBuf::from("/work/acme/acme/dbt/acme/models"));
        assert_eq!(
            layout.manifest_path,
            PathBuf::from("/work/acme/acme/dbt/acme/target/manifest.json")
        );
    }

    #[test]
    fn development_root_points_at_test_project() {
        let cwd = Path::new("/src/sidetrek");
        assert_eq!(
            resolve_root(cwd, Some("development")),
            PathBuf::from("/src/sidetrek/../test_proj")
        );
        assert_eq!(resolve_root(cwd, Some("production")), cwd.to_path_buf());
        assert_eq!(resolve_root(cwd, None), cwd.to_path_buf());
    }

    #[test]
    fn discover_reads_project_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILENAME),
            "metadata:\n  project_name: shop\n",
        )
        .unwrap();

        let layout = ProjectLayout::discover(dir.path()).unwrap();
        assert_eq!(layout.project_name, "shop");
        assert_eq!(layout.models_dir, dir.path().join("shop/dbt/shop/models"));
    }

    #[test]
    fn discover_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectLayout::discover(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ProjectConfigNotFound));
    }
}
