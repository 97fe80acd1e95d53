//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["hq.toml", ".hq.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `HQ_` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./hq.toml` or `./.hq.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/hq/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        let mut files = Vec::new();

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            files.push(global_path);
        }
        if let Some(project_path) = Self::project_config_path() {
            files.push(project_path);
        }
        if let Some(path) = config_path {
            files.push(path.to_path_buf());
        }

        Self::load_files(&files)
    }

    /// Merge `files` in order (later wins) over the defaults, then the environment
    pub fn load_files(files: &[PathBuf]) -> Result<FileConfig, Box<figment::Error>> {
        let figment = files.iter().fold(
            Figment::new().merge(Serialized::defaults(FileConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        );

        figment
            .merge(Env::prefixed("HQ_").split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/hq/config.toml if set,
    /// otherwise the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hq").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `show-config`)
    pub fn config_sources() -> Vec<(String, bool)> {
        let mut sources = Vec::new();

        match Self::project_config_path() {
            Some(path) => sources.push((format!("Project: {}", path.display()), true)),
            None => sources.push(("Project: ./hq.toml or ./.hq.toml".to_string(), false)),
        }
        if let Some(path) = Self::global_config_path() {
            let found = path.exists();
            sources.push((format!("Global:  {}", path.display()), found));
        }
        sources.push(("Default: built-in defaults".to_string(), true));
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use std::io::Write;

    fn write_toml(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.models.default.is_none());
        assert!(!config.pipeline.auto_approve);
    }

    #[test]
    fn test_later_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let global = write_toml(
            &dir,
            "global.toml",
            "[pipeline]\nauto_approve = true\nmax_tokens = 1000\n",
        );
        let explicit = write_toml(
            &dir,
            "explicit.toml",
            "[pipeline]\nmax_tokens = 2000\n\n[storage]\nbackend = \"memory\"\n",
        );

        let config = ConfigLoader::load_files(&[global, explicit]).unwrap();
        assert!(config.pipeline.auto_approve);
        assert_eq!(config.pipeline.max_tokens, 2000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.pipeline.timeout_seconds, 120);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_toml(&dir, "bad.toml", "[pipeline]\nauto_approve = \"often\"\n");
        assert!(ConfigLoader::load_files(&[bad]).is_err());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("hq"));
    }
}
