use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tutorlens_core::{EngineConfig, LexiconConfig};

/// Table holding phrases appended to the lexicon instead of replacing it.
const EXTEND_LEXICON: &str = "extend_lexicon";

pub struct ConfigLoader;

/// Extra lexicon phrases from one config layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LexiconExtension {
    code_request: Vec<String>,
    hostile: Vec<String>,
    interrogative: Vec<String>,
}

impl From<LexiconExtension> for LexiconConfig {
    fn from(ext: LexiconExtension) -> Self {
        LexiconConfig {
            code_request: ext.code_request,
            hostile: ext.hostile,
            interrogative: ext.interrogative,
        }
    }
}

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit path)
    pub fn load(explicit: Option<&Path>) -> Result<EngineConfig> {
        if let Some(path) = explicit
            && !path.exists()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let layers: Vec<PathBuf> = Self::layer_paths(explicit)
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        Self::load_layers(&layers)
    }

    /// Every path consulted, lowest precedence first
    pub fn layer_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_config_path() {
            paths.push(user);
        }
        paths.push(Self::project_config_path());
        if let Some(path) = explicit {
            paths.push(path.to_path_buf());
        }
        paths
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tutorlens").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TUTORLENS_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        Self::project_config_path_from(std::env::var("TUTORLENS_PROJECT_CONFIG_DIR").ok())
    }

    fn project_config_path_from(override_dir: Option<String>) -> PathBuf {
        match override_dir {
            Some(dir) => PathBuf::from(dir).join("config.toml"),
            None => PathBuf::from(".tutorlens/config.toml"),
        }
    }

    /// Merge the given files in order; later files win.
    pub fn load_layers(paths: &[PathBuf]) -> Result<EngineConfig> {
        let mut raw = toml::Table::new();
        let mut extension = LexiconConfig {
            code_request: Vec::new(),
            hostile: Vec::new(),
            interrogative: Vec::new(),
        };

        for path in paths {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut layer: toml::Table = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            if let Some(extra) = layer.remove(EXTEND_LEXICON) {
                let extra: LexiconExtension = extra
                    .try_into()
                    .with_context(|| format!("Invalid [{EXTEND_LEXICON}] in {}", path.display()))?;
                extension.merge(&extra.into());
            }
            raw = Self::merge_raw(raw, layer);
        }

        Self::finalize(raw, &extension)
    }

    /// Merge two raw tables (overlay values override base, nested tables merge)
    fn merge_raw(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
        for (key, value) in overlay {
            match (base.remove(&key), value) {
                (Some(toml::Value::Table(inner)), toml::Value::Table(over)) => {
                    base.insert(key, toml::Value::Table(Self::merge_raw(inner, over)));
                }
                (_, value) => {
                    base.insert(key, value);
                }
            }
        }
        base
    }

    /// Convert the merged table to a validated config with defaults applied
    fn finalize(raw: toml::Table, extension: &LexiconConfig) -> Result<EngineConfig> {
        let mut config: EngineConfig = toml::Value::Table(raw)
            .try_into()
            .context("Invalid configuration")?;
        config.lexicon.merge(extension);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_no_layers_returns_defaults() {
        let config = ConfigLoader::load_layers(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let dir = TempDir::new().unwrap();
        let user = write(&dir, "user.toml", "[scoring]\nlow_max = 30\nmedium_max = 70\n");
        let project = write(&dir, "project.toml", "[scoring]\nmedium_max = 65\n");

        let config = ConfigLoader::load_layers(&[user, project]).unwrap();

        assert_eq!(config.scoring.low_max, 30);
        assert_eq!(config.scoring.medium_max, 65);
        assert_eq!(config.scoring.dependency_weight, 0.4);
    }

    #[test]
    fn test_lexicon_list_replaces_but_extension_appends() {
        let dir = TempDir::new().unwrap();
        let replace = write(&dir, "a.toml", "[lexicon]\nhostile = [\"\\\\bugh\\\\b\"]\n");
        let extend = write(
            &dir,
            "b.toml",
            "[extend_lexicon]\nhostile = [\"\\\\bmeh\\\\b\"]\ncode_request = [\"\\\\bsolve it\\\\b\"]\n",
        );

        let config = ConfigLoader::load_layers(&[replace, extend]).unwrap();

        assert_eq!(config.lexicon.hostile, vec![r"\bugh\b", r"\bmeh\b"]);
        assert_eq!(
            config.lexicon.code_request.last().map(String::as_str),
            Some(r"\bsolve it\b")
        );
        assert!(config.lexicon.code_request.len() > 1);
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "[scoring]\nlow_max = 90\n");

        assert!(ConfigLoader::load_layers(&[path]).is_err());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.toml", "[scoring\n");

        let err = ConfigLoader::load_layers(&[path]).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(ConfigLoader::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_project_path_override() {
        assert_eq!(
            ConfigLoader::project_config_path_from(Some("/tmp/isolated".to_string())),
            PathBuf::from("/tmp/isolated/config.toml")
        );
        assert_eq!(
            ConfigLoader::project_config_path_from(None),
            PathBuf::from(".tutorlens/config.toml")
        );
    }

    #[test]
    fn test_explicit_path_is_last_layer() {
        let explicit = PathBuf::from("custom.toml");
        let paths = ConfigLoader::layer_paths(Some(&explicit));
        assert_eq!(paths.last(), Some(&explicit));
    }
}
