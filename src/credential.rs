// ABOUTME: Credential types and pluggable credential sources.
// ABOUTME: Secrets are resolved at connect time and never persisted or logged.

use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("credential prompt failed: {0}")]
    Prompt(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;

/// An authentication secret for the remote host.
#[derive(Clone)]
pub enum Credential {
    /// Password authentication.
    Password(String),
    /// Private key file, optionally passphrase-protected.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Keys held by the local SSH agent.
    Agent,
}

// Secrets must not leak through Debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Credential::Password(<redacted>)"),
            Credential::KeyFile { path, .. } => f
                .debug_struct("Credential::KeyFile")
                .field("path", path)
                .field("passphrase", &"<redacted>")
                .finish(),
            Credential::Agent => f.write_str("Credential::Agent"),
        }
    }
}

/// Supplies a credential on demand.
///
/// The orchestrator never reads secrets itself; callers plug in a source
/// (interactive prompt, environment variable, vault) and tests plug in a
/// fixed value.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Result<Credential>;
}

/// A fixed credential, for tests and non-interactive callers.
pub struct StaticCredential(Credential);

impl StaticCredential {
    pub fn new(credential: Credential) -> Self {
        Self(credential)
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}

/// Reads a password from an environment variable.
pub struct EnvPassword {
    var: String,
}

impl EnvPassword {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvPassword {
    fn credential(&self) -> Result<Credential> {
        let password = env::var(&self.var)
            .map_err(|_| CredentialError::MissingEnvVar(self.var.clone()))?;
        Ok(Credential::Password(password))
    }
}

/// Prompts for a password on the terminal with echo disabled.
pub struct PromptPassword {
    prompt: String,
}

impl PromptPassword {
    pub fn new(user: &str, host: &str) -> Self {
        Self {
            prompt: format!("Password for {user}@{host}"),
        }
    }
}

impl CredentialSource for PromptPassword {
    fn credential(&self) -> Result<Credential> {
        let password = dialoguer::Password::new()
            .with_prompt(&self.prompt)
            .interact()
            .map_err(|e| CredentialError::Prompt(e.to_string()))?;
        Ok(Credential::Password(password))
    }
}

/// A key file from configuration, with an optional passphrase variable.
pub struct KeyFileCredential {
    path: PathBuf,
    passphrase_env: Option<String>,
}

impl KeyFileCredential {
    pub fn new(path: impl Into<PathBuf>, passphrase_env: Option<String>) -> Self {
        Self {
            path: path.into(),
            passphrase_env,
        }
    }
}

impl CredentialSource for KeyFileCredential {
    fn credential(&self) -> Result<Credential> {
        let passphrase = match &self.passphrase_env {
            Some(var) => Some(
                env::var(var).map_err(|_| CredentialError::MissingEnvVar(var.clone()))?,
            ),
            None => None,
        };
        Ok(Credential::KeyFile {
            path: self.path.clone(),
            passphrase,
        })
    }
}
