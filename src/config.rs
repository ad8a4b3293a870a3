use std::{
    env,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::remote::DEFAULT_API_URL;

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Which remote repository implementation serves the uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Github,
    /// In-process store, for local development
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Backend::Github),
            "memory" => Ok(Backend::Memory),
            other => anyhow::bail!("Unknown backend '{}' (expected github or memory)", other),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Github => f.write_str("github"),
            Backend::Memory => f.write_str("memory"),
        }
    }
}

/// Configuration for the uploader, loaded once at startup
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listen port
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// GitHub token; uploads are refused while unset
    #[serde(default)]
    pub github_token: Option<String>,
    /// GitHub REST API base URL
    #[serde(default = "defaults::api_url")]
    pub api_url: String,
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default = "defaults::branch")]
    pub branch: String,
    /// Path of the upload counter file in the repository
    #[serde(default = "defaults::counter_file_path")]
    pub counter_file_path: String,
    /// Directory uploads land in when the caller gives no path
    #[serde(default = "defaults::upload_prefix")]
    pub upload_prefix: String,
    #[serde(default)]
    pub backend: Backend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            github_token: None,
            api_url: defaults::api_url(),
            repo_owner: String::new(),
            repo_name: String::new(),
            branch: defaults::branch(),
            counter_file_path: defaults::counter_file_path(),
            upload_prefix: defaults::upload_prefix(),
            backend: Backend::default(),
        }
    }
}

// The token must never end up in logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("repo_owner", &self.repo_owner)
            .field("repo_name", &self.repo_name)
            .field("branch", &self.branch)
            .field("counter_file_path", &self.counter_file_path)
            .field("upload_prefix", &self.upload_prefix)
            .field("backend", &self.backend)
            .finish()
    }
}

/// Read a non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the config file (if any) and environment variables.
    ///
    /// `explicit_path` comes from the command line; a file named there, or by
    /// `GITHUB_UPLOADER_CONFIG`, must exist. The default file is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let named = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| env_var("GITHUB_UPLOADER_CONFIG").map(PathBuf::from))
            .map(|p| expand_tilde(&p));

        let mut config = match named {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found at {:?}", path);
                }
                Self::load_from_file(&path)?
            }
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables on top of file values
    fn apply_env(&mut self) -> Result<()> {
        if let Some(port) = env_var("SERVER_PORT") {
            self.port = port
                .trim()
                .parse()
                .context("Failed to parse SERVER_PORT as u16")?;
        }

        if let Some(token) = env_var("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }

        if let Some(url) = env_var("GITHUB_API_URL") {
            self.api_url = url;
        }

        if let Some(owner) = env_var("REPO_OWNER") {
            self.repo_owner = owner;
        }

        if let Some(name) = env_var("REPO_NAME") {
            self.repo_name = name;
        }

        if let Some(branch) = env_var("BRANCH_NAME") {
            self.branch = branch;
        }

        if let Some(path) = env_var("COUNTER_FILE_PATH") {
            self.counter_file_path = path;
        }

        if let Some(prefix) = env_var("UPLOAD_PATH_PREFIX") {
            self.upload_prefix = prefix;
        }

        if let Some(backend) = env_var("REMOTE_BACKEND") {
            self.backend = backend.parse().context("Failed to parse REMOTE_BACKEND")?;
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get default config file path
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/github-uploader/config.yaml"))
    }

    /// Check the settings the selected backend cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.branch.trim().is_empty() {
            anyhow::bail!("branch must not be empty");
        }
        if self.counter_file_path.trim_start_matches('/').is_empty() {
            anyhow::bail!("counter file path must not be empty");
        }
        if self.backend == Backend::Github {
            if self.repo_owner.is_empty() {
                anyhow::bail!("REPO_OWNER is required for the github backend");
            }
            if self.repo_name.is_empty() {
                anyhow::bail!("REPO_NAME is required for the github backend");
            }
        }
        Ok(())
    }

    /// `owner/name` for logs
    pub fn repository(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

mod defaults {
    pub(crate) fn port() -> u16 {
        3000
    }

    pub(crate) fn api_url() -> String {
        super::DEFAULT_API_URL.to_string()
    }

    pub(crate) fn branch() -> String {
        "main".to_string()
    }

    pub(crate) fn counter_file_path() -> String {
        "upload_count.json".to_string()
    }

    pub(crate) fn upload_prefix() -> String {
        "files".to_string()
    }
}
