use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

/// Standard configuration file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "tfindex.toml";

/// Which documents a reference that does not resolve locally may resolve against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveScope {
    /// Only documents in the same directory (the same Terraform module).
    #[default]
    Module,
    /// Every tracked document.
    Corpus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File suffixes a workspace scan picks up.
    pub file_extensions: Vec<String>,
    pub resolve_scope: ResolveScope,
    /// Skip dot-files and dot-directories (e.g. `.terraform/`) during a workspace scan.
    pub skip_hidden: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            file_extensions: vec!["tf".to_string()],
            resolve_scope: ResolveScope::Module,
            skip_hidden: true,
        }
    }
}

impl IndexConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, IndexError> {
        let config: IndexConfig = toml::from_str(content)?;
        if config.file_extensions.iter().any(|ext| ext.trim().is_empty()) {
            return Err(IndexError::Config(
                "file_extensions must not contain empty entries".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, IndexError> {
        Ok(toml::to_string(self)?)
    }

    /// Whether `path` carries one of the configured extensions. Extensions are matched without
    /// their leading dot and case-insensitively.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.file_extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Reads and writes an [IndexConfig] stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    /// Provider for the [CONFIG_FILE_NAME] file inside `root`.
    pub fn in_dir<P: AsRef<Path>>(root: P) -> Self {
        TomlConfigProvider::new(root.as_ref().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, falling back to [IndexConfig::default] if the file does not
    /// exist.
    pub fn load(&self) -> Result<IndexConfig, IndexError> {
        tracing::debug!("Attempting to read index config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(IndexConfig::default());
        }
        let content = read_to_string(&self.path)?;
        IndexConfig::from_toml_str(&content)
    }

    pub fn store(&self, config: &IndexConfig) -> Result<(), IndexError> {
        tracing::debug!("Attempting to write index config to: {:?}", &self.path);
        write(&self.path, config.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let config = IndexConfig::from_toml_str("resolve_scope = \"corpus\"\n").unwrap();
        assert_eq!(config.resolve_scope, ResolveScope::Corpus);
        assert_eq!(config.file_extensions, vec!["tf".to_string()]);
        assert!(config.skip_hidden);
    }

    #[test]
    fn test_rejects_unknown_scope_and_empty_extension() {
        assert!(matches!(
            IndexConfig::from_toml_str("resolve_scope = \"galaxy\"\n"),
            Err(IndexError::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_toml_str("file_extensions = [\"tf\", \"\"]\n"),
            Err(IndexError::Config(_))
        ));
    }

    #[test]
    fn test_extension_matching() {
        let config = IndexConfig {
            file_extensions: vec!["tf".to_string(), ".hcl".to_string()],
            ..Default::default()
        };
        assert!(config.matches_extension(Path::new("/a/main.tf")));
        assert!(config.matches_extension(Path::new("/a/terragrunt.HCL")));
        assert!(!config.matches_extension(Path::new("/a/terraform.tfvars")));
        assert!(!config.matches_extension(Path::new("/a/Makefile")));
    }

    #[test]
    fn test_provider_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::in_dir(dir.path());
        assert_eq!(provider.load().unwrap(), IndexConfig::default());

        let config = IndexConfig {
            resolve_scope: ResolveScope::Corpus,
            skip_hidden: false,
            ..Default::default()
        };
        provider.store(&config).unwrap();
        assert_eq!(provider.load().unwrap(), config);
    }
}
