// ABOUTME: Configuration types and parsing for skiff.yml.
// ABOUTME: Handles YAML parsing, discovery, and CLI overrides.

mod target;

pub use target::TargetConfig;

use crate::credential::{
    CredentialSource, EnvPassword, KeyFileCredential, PromptPassword,
};
use crate::error::{Error, Result};
use crate::transport::TransportOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "skiff.yml";
pub const CONFIG_FILENAME_ALT: &str = "skiff.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".skiff/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service name, used as the release filename prefix.
    pub service: String,

    /// Local path of the deployable artifact (the build collaborator's output).
    pub artifact: PathBuf,

    #[serde(deserialize_with = "deserialize_target")]
    pub target: TargetConfig,

    /// The port the deployed service listens on.
    pub app_port: u16,

    /// Environment-preparation step sourced before launch, verbatim
    /// (e.g. ". ./.env").
    #[serde(default)]
    pub env_setup: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Remove the local artifact after the deploy attempt.
    #[serde(default = "default_true")]
    pub cleanup_artifact: bool,

    #[serde(default = "default_true")]
    pub trust_first_connection: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Private key file; wins over password auth when set.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Environment variable holding the key passphrase.
    #[serde(default)]
    pub key_passphrase_env: Option<String>,

    /// Environment variable holding the password. When unset and no key is
    /// configured, the password is prompted for interactively.
    #[serde(default)]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command: Duration,

    /// Per-chunk upload timeout; progress is the liveness signal.
    #[serde(default = "default_chunk_timeout", with = "humantime_serde")]
    pub chunk: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            command: default_command_timeout(),
            chunk: default_chunk_timeout(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_chunk_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: self.timeouts.connect,
            command_timeout: self.timeouts.command,
            chunk_timeout: self.timeouts.chunk,
            trust_on_first_use: self.trust_first_connection,
            ..TransportOptions::default()
        }
    }

    /// Build the credential source implied by the auth section:
    /// key file, then password-from-env, then interactive prompt.
    pub fn credential_source(&self) -> Box<dyn CredentialSource> {
        if let Some(key) = &self.auth.key {
            return Box::new(KeyFileCredential::new(
                key.clone(),
                self.auth.key_passphrase_env.clone(),
            ));
        }
        if let Some(var) = &self.auth.password_env {
            return Box::new(EnvPassword::new(var.clone()));
        }
        Box::new(PromptPassword::new(
            &self.target.resolved_user(),
            &self.target.host,
        ))
    }
}

pub fn init_config(dir: &Path, service: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let service = service.unwrap_or("my-app");
    let yaml = format!(
        r#"service: {service}
artifact: ./{service}
target:
  host: server.example.com
  port: 22
  user: deploy
  directory: /home/deploy/deploy
app_port: 8080
env_setup: ". ./.env"
"#
    );
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn deserialize_target<'de, D>(deserializer: D) -> std::result::Result<TargetConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    TargetEntry::deserialize(deserializer)?
        .into_target()
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetEntry {
    Simple(String),
    Detailed(TargetConfig),
}

impl TargetEntry {
    fn into_target(self) -> std::result::Result<TargetConfig, String> {
        match self {
            TargetEntry::Simple(s) => TargetConfig::parse(&s),
            TargetEntry::Detailed(t) => Ok(t),
        }
    }
}
