//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for Tessera
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    /// Create a new Paths instance with XDG discovery
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("org", "Tessera", "tessera"),
        }
    }

    /// Get user config directory (~/.config/tessera/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// Get user config file path (~/.config/tessera/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Get project config file path (tessera.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("tessera.toml")
    }

    /// Get local config file path (tessera.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("tessera.local.toml")
    }

    /// Check if a directory holds a project config (has tessera.toml)
    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TesseraConfig;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        let paths = Paths::new();

        // Platform dependent; only check the app name when discovery works
        if let Ok(config_file) = paths.user_config_file() {
            assert!(config_file.to_string_lossy().contains("tessera"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_project_paths() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_file = Paths::project_config_file(project_dir);
        assert_eq!(config_file, project_dir.join("tessera.toml"));

        let local_file = Paths::local_config_file(project_dir);
        assert_eq!(local_file, project_dir.join("tessera.local.toml"));

        assert!(!Paths::is_initialized(project_dir));

        std::fs::write(&config_file, "[authority]\nid = \"test\"\n").unwrap();
        assert!(Paths::is_initialized(project_dir));
    }

    #[test]
    fn test_local_override_alone_is_not_a_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        std::fs::write(
            Paths::local_config_file(project_dir),
            "[resolver]\nstrict = true\n",
        )
        .unwrap();

        assert!(!Paths::is_initialized(project_dir));
    }

    #[test]
    fn test_project_file_feeds_layered_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        std::fs::write(
            Paths::project_config_file(project_dir),
            r#"
[authority]
id = "https://idp.example.org"

[[attribute_definitions]]
id = "uid"
type = "principal_name"
"#,
        )
        .unwrap();

        let config = TesseraConfig::load_from_dir(project_dir).expect("Failed to load config");
        assert_eq!(config.authority.id, "https://idp.example.org");
        assert_eq!(config.attribute_definitions[0].id, "uid");
    }
}
