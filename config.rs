//! Vault locations: where the credential file and the notebook live.
//!
//! A [`Config`] is read from a JSON file and then adjusted by environment
//! variables. The file is found through [`ConfigSource::resolve`]:
//!
//! 1. the path passed on the command line,
//! 2. else `NOTEVAULT_CONFIG`,
//! 3. else `./config.json` if it exists,
//! 4. else built-in defaults.
//!
//! A path named by (1) or (2) must exist. Falling back to the defaults there
//! would quietly start a second vault in the working directory.
//!
//! `NOTEVAULT_CREDENTIAL_PATH` and `NOTEVAULT_NOTEBOOK_DIR` override the
//! matching field whichever source was used.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

pub const ENV_CREDENTIAL_PATH: &str = "NOTEVAULT_CREDENTIAL_PATH";
pub const ENV_NOTEBOOK_DIR: &str = "NOTEVAULT_NOTEBOOK_DIR";
pub const ENV_CONFIG_PATH: &str = "NOTEVAULT_CONFIG";

/// Looked for in the working directory when no path is named.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub credential_path: String,
    pub notebook_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credential_path: "./.login".to_string(),
            notebook_dir: "./My Notebook".to_string(),
        }
    }
}

/// Where a config file path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by the operator; it is an error for the file to be missing.
    Explicit(String),
    /// [`DEFAULT_CONFIG_PATH`]; used only if present.
    Implicit(String),
}

impl ConfigSource {
    /// Command-line path first, then `NOTEVAULT_CONFIG`, then the default.
    pub fn resolve(cli_path: Option<&str>) -> Self {
        Self::pick(cli_path, env::var(ENV_CONFIG_PATH).ok())
    }

    fn pick(cli_path: Option<&str>, env_path: Option<String>) -> Self {
        match (cli_path, env_path) {
            (Some(p), _) => Self::Explicit(p.to_string()),
            (None, Some(p)) if !p.trim().is_empty() => Self::Explicit(p),
            _ => Self::Implicit(DEFAULT_CONFIG_PATH.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Explicit(p) | Self::Implicit(p) => p,
        }
    }
}

impl Config {
    pub fn new(credential_path: impl Into<String>, notebook_dir: impl Into<String>) -> Self {
        Self {
            credential_path: credential_path.into(),
            notebook_dir: notebook_dir.into(),
        }
    }

    /// Reads `path`, applies environment overrides and validates.
    pub fn load(path: &str) -> Result<Self> {
        info!(path, "loading config from file");
        let s = fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        let config: Config =
            serde_json::from_str(&s).with_context(|| format!("parsing config file {}", path))?;
        config.finish()
    }

    /// Resolves the config file (see the module docs) and loads it.
    pub fn load_with_env(cli_path: Option<&str>) -> Result<Self> {
        Self::load_from(&ConfigSource::resolve(cli_path))
    }

    pub fn load_from(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::Explicit(p) => Self::load(p),
            ConfigSource::Implicit(p) if Path::new(p).exists() => Self::load(p),
            ConfigSource::Implicit(_) => {
                debug!("no config file, using defaults");
                Config::default().finish()
            }
        }
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(credential_path) = env::var(ENV_CREDENTIAL_PATH) {
            debug!(credential_path = %credential_path, "credential_path from environment");
            self.credential_path = credential_path;
        }
        if let Ok(notebook_dir) = env::var(ENV_NOTEBOOK_DIR) {
            debug!(notebook_dir = %notebook_dir, "notebook_dir from environment");
            self.notebook_dir = notebook_dir;
        }
    }

    /// Rejects locations the vault cannot work with.
    ///
    /// The credential file may not live inside the notebook directory (nor
    /// the notebook inside the credential path), since deleting notes and
    /// enumerating the directory must never touch it.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("credential_path", &self.credential_path),
            ("notebook_dir", &self.notebook_dir),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", field);
            }
            if value.contains('\0') {
                anyhow::bail!("{} contains a NUL byte", field);
            }
        }

        let credential = lexical(&self.credential_path);
        let notebook = lexical(&self.notebook_dir);
        if credential.starts_with(&notebook) || notebook.starts_with(&credential) {
            anyhow::bail!(
                "credential file '{}' overlaps notebook directory '{}'",
                self.credential_path,
                self.notebook_dir
            );
        }
        Ok(())
    }
}

/// `path` without `.` components, so `./a/b` and `a/./b` compare equal.
fn lexical(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env_overrides_set() -> bool {
        env::var(ENV_CREDENTIAL_PATH).is_ok() || env::var(ENV_NOTEBOOK_DIR).is_ok()
    }

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_or_nul_paths_are_rejected() {
        assert!(Config::new("", "notes").validate().is_err());
        assert!(Config::new(".login", "  ").validate().is_err());
        assert!(Config::new(".lo\0gin", "notes").validate().is_err());
    }

    #[test]
    fn credential_file_inside_notebook_is_rejected() {
        assert!(Config::new("./My Notebook/.login", "My Notebook").validate().is_err());
        assert!(Config::new("notes/./.1", "notes/").validate().is_err());
        assert!(Config::new("vault", "./vault").validate().is_err());
        assert!(Config::new("vault/.login", "vault/.login/notes").validate().is_err());

        Config::new("vault/.login", "vault/notes").validate().unwrap();
        Config::new("/srv/notes.login", "/srv/notes").validate().unwrap();
    }

    #[test]
    fn command_line_path_wins_over_environment() {
        let source = ConfigSource::pick(Some("cli.json"), Some("env.json".into()));
        assert_eq!(source, ConfigSource::Explicit("cli.json".into()));
    }

    #[test]
    fn environment_path_is_used_without_command_line_path() {
        let source = ConfigSource::pick(None, Some("/etc/notevault.json".into()));
        assert_eq!(source, ConfigSource::Explicit("/etc/notevault.json".into()));

        let source = ConfigSource::pick(None, None);
        assert_eq!(source, ConfigSource::Implicit(DEFAULT_CONFIG_PATH.into()));
        assert_eq!(ConfigSource::pick(None, Some(" ".into())), source);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.json");
        let missing = missing.to_str().unwrap();

        assert!(Config::load_with_env(Some(missing)).is_err());
        assert!(Config::load_from(&ConfigSource::Explicit(missing.into())).is_err());
    }

    #[test]
    fn missing_implicit_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join(DEFAULT_CONFIG_PATH);
        let loaded = Config::load_from(&ConfigSource::Implicit(missing.to_str().unwrap().into())).unwrap();
        if !env_overrides_set() {
            assert_eq!(loaded, Config::default());
        }
    }

    #[test]
    fn explicit_file_is_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("real.json");
        let cfg = Config::new("/srv/vault/.login", "/x/notes");
        fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = Config::load_with_env(Some(path.to_str().unwrap())).unwrap();
        if !env_overrides_set() {
            assert_eq!(loaded, cfg);
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }
}
