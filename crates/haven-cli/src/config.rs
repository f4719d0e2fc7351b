//! CLI configuration.
//!
//! Settings merge in precedence order: built-in defaults, `config.toml` in
//! the platform config directory, an explicit `--config` file, then
//! `HAVEN_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Settings for the maintenance commands.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the SQLite database file.
    pub database_path: PathBuf,

    /// Log sweep progress every this many records.
    pub progress_every: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("progress_every", &self.progress_every)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("haven.db"),
            progress_every: 500,
        }
    }
}

impl Config {
    /// Loads configuration from the default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, merging an explicit file when one is given.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("HAVEN_")).extract()
    }
}

/// Platform config directory for haven.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("haven"))
}

/// Platform data directory for haven.
///
/// On Linux: `~/.local/share/haven`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("haven"))
}
