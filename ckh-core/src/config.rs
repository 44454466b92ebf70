use crate::error::{CkhError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Virtualenv the CKAN install lives in
pub const DEFAULT_VENV_DIR: &str = "/usr/lib/ckan/default";

/// CKAN ini appended to every harvester invocation
pub const DEFAULT_CKAN_INI: &str = "/etc/ckan/default/development.ini";

/// Plugin that provides the harvester CLI
pub const DEFAULT_PLUGIN: &str = "ckanext-harvest";

/// Command front-end hosting the plugin CLI and the dev server
pub const DEFAULT_PASTER_BIN: &str = "paster";

/// Optional per-directory override file
pub const CONFIG_FILE_NAME: &str = "ckh.toml";

/// Resolved tool configuration.
///
/// Defaults are the stock CKAN install paths. An optional `ckh.toml` in the
/// working directory and CLI flags may override them; flags win over the
/// file, the file wins over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub venv_dir: PathBuf,
    pub ckan_ini: PathBuf,
    pub plugin: String,
    pub paster_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            ckan_ini: PathBuf::from(DEFAULT_CKAN_INI),
            plugin: DEFAULT_PLUGIN.to_string(),
            paster_bin: DEFAULT_PASTER_BIN.to_string(),
        }
    }
}

impl Config {
    /// Activation script inside the virtualenv
    pub fn activate_script(&self) -> PathBuf {
        self.venv_dir.join("bin").join("activate")
    }

    /// `bin` directory of the virtualenv, prepended to PATH for children
    pub fn venv_bin_dir(&self) -> PathBuf {
        self.venv_dir.join("bin")
    }

    /// Load the configuration for `dir`: defaults overlaid with the
    /// directory's `ckh.toml`, when present.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::default();
        let file = dir.join(CONFIG_FILE_NAME);
        if file.exists() {
            config.apply(ConfigOverrides::from_file(&file)?);
        }
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(venv_dir) = overrides.venv_dir {
            self.venv_dir = venv_dir;
        }
        if let Some(ckan_ini) = overrides.ckan_ini {
            self.ckan_ini = ckan_ini;
        }
        if let Some(plugin) = overrides.plugin {
            self.plugin = plugin;
        }
        if let Some(paster_bin) = overrides.paster_bin {
            self.paster_bin = paster_bin;
        }
    }
}

/// Partial configuration from `ckh.toml` or CLI flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub venv_dir: Option<PathBuf>,
    pub ckan_ini: Option<PathBuf>,
    pub plugin: Option<String>,
    pub paster_bin: Option<String>,
}

impl ConfigOverrides {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CkhError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_stock_ckan_paths() {
        let config = Config::default();
        assert_eq!(config.venv_dir, PathBuf::from("/usr/lib/ckan/default"));
        assert_eq!(
            config.ckan_ini,
            PathBuf::from("/etc/ckan/default/development.ini")
        );
        assert_eq!(config.plugin, "ckanext-harvest");
        assert_eq!(config.paster_bin, "paster");
    }

    #[test]
    fn test_activate_script_path() {
        let config = Config::default();
        assert_eq!(
            config.activate_script(),
            PathBuf::from("/usr/lib/ckan/default/bin/activate")
        );
    }

    #[test]
    fn test_load_without_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_overlays_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "venv_dir = \"/opt/ckan\"\nplugin = \"ckanext-nextgeossharvest\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.venv_dir, PathBuf::from("/opt/ckan"));
        assert_eq!(config.plugin, "ckanext-nextgeossharvest");
        // untouched keys keep their defaults
        assert_eq!(
            config.ckan_ini,
            PathBuf::from("/etc/ckan/default/development.ini")
        );
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "venv_dir = [").unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, CkhError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_apply_precedence_flag_over_file() {
        let mut config = Config::default();
        config.apply(ConfigOverrides {
            ckan_ini: Some(PathBuf::from("/etc/ckan/default/production.ini")),
            ..Default::default()
        });
        assert_eq!(
            config.ckan_ini,
            PathBuf::from("/etc/ckan/default/production.ini")
        );
    }
}
