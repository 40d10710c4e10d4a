//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/kvsession/config.toml` (XDG user config)
//! 2. `./kvsession.toml` (project-local)
//! 3. An explicit file named by the caller

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{ConfigError, Result, TomlConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "kvsession.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "kvsession";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "KVSESSION_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct SourceLayer {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
    /// Why an existing file was skipped.
    pub error: Option<String>,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: TomlConfig,
    /// Layers that were checked, in order of precedence (lowest first).
    pub sources: Vec<SourceLayer>,
    /// Files that existed but could not be loaded.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of layers that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(None, None, explicit)
}

/// Load configuration with explicit control over the discovered directories.
///
/// `config_dir` overrides both `KVSESSION_CONFIG_DIR` and the platform default;
/// `project_dir` replaces the current directory for the project-local file.
/// A broken discovered file is skipped with a warning, a broken `explicit`
/// file is an error.
pub fn load_config_with_options(
    config_dir: Option<&Path>,
    project_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = TomlConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if let Some(path) = explicit {
        config.merge(load_config_file(path)?);
        sources.push(SourceLayer {
            path: path.to_path_buf(),
            loaded: true,
            error: None,
        });
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TomlConfig::from_toml(&contents)
}

/// Get the XDG config file path for kvsession.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for kvsession.
///
/// Checks `KVSESSION_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn load_layer(config: &mut TomlConfig, path: &Path, warnings: &mut Vec<String>) -> SourceLayer {
    if !path.is_file() {
        return SourceLayer {
            path: path.to_path_buf(),
            loaded: false,
            error: None,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            debug!(path = %path.display(), "Loaded config layer");
            config.merge(layer);
            SourceLayer {
                path: path.to_path_buf(),
                loaded: true,
                error: None,
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable config layer");
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            SourceLayer {
                path: path.to_path_buf(),
                loaded: false,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigSource;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_layers_merge_in_order() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(
            user.path(),
            USER_CONFIG_FILE,
            "[session.store]\nregion = \"us-east-1\"\ntable = \"user\"\n",
        );
        write(
            project.path(),
            PROJECT_CONFIG_FILE,
            "[session.store]\ntable = \"project\"\n",
        );
        let explicit = write(project.path(), "extra.toml", "[session]\nexpiration = 60\n");

        let loaded =
            load_config_with_options(Some(user.path()), Some(project.path()), Some(explicit.as_path()))
                .unwrap();

        let config = &loaded.config;
        assert_eq!(
            config.get_str("session.store.region").unwrap().as_deref(),
            Some("us-east-1")
        );
        assert_eq!(
            config.get_str("session.store.table").unwrap().as_deref(),
            Some("project")
        );
        assert_eq!(config.get_u64("session.expiration").unwrap(), Some(60));
        assert_eq!(loaded.loaded_from().len(), 3);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        let empty = TempDir::new().unwrap();
        let loaded = load_config_with_options(Some(empty.path()), Some(empty.path()), None).unwrap();

        assert!(loaded.config.is_empty());
        assert_eq!(loaded.sources.len(), 2);
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_broken_discovered_layer_is_a_warning() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(user.path(), USER_CONFIG_FILE, "[session\n");

        let loaded =
            load_config_with_options(Some(user.path()), Some(project.path()), None).unwrap();

        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.sources[0].error.is_some());
        assert!(loaded.sources[1].error.is_none());
    }

    #[test]
    fn test_broken_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let explicit = write(dir.path(), "bad.toml", "not = [valid");

        let result = load_config_with_options(Some(dir.path()), Some(dir.path()), Some(explicit.as_path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_config_with_options(
            Some(dir.path()),
            Some(dir.path()),
            Some(dir.path().join("absent.toml").as_path()),
        );
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
