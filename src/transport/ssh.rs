// ABOUTME: SSH-backed transport implementation using russh.
// ABOUTME: Connection, authentication, command execution, and chunked upload.

use super::error::{Error, Result};
use super::{CommandOutput, Connector, ProgressFn, ProgressTracker, Transport};
use crate::command::sh_quote;
use crate::config::TargetConfig;
use crate::credential::Credential;
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Tuning knobs for the SSH transport.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Timeout for TCP connect plus SSH handshake.
    pub connect_timeout: Duration,
    /// Timeout for a whole remote command.
    pub command_timeout: Duration,
    /// Timeout per uploaded chunk. Progress doubles as the liveness signal,
    /// so slow links with steady progress never trip this.
    pub chunk_timeout: Duration,
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// Accept and record unknown host keys (Trust On First Use).
    pub trust_on_first_use: bool,
    /// Alternative known_hosts file; defaults to ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300),
            chunk_timeout: Duration::from_secs(30),
            chunk_size: 64 * 1024,
            trust_on_first_use: false,
            known_hosts_path: None,
        }
    }
}

/// Host key verification for russh.
struct HostKeyHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl HostKeyHandler {
    fn verify(&self, key: &ssh_key::PublicKey) -> bool {
        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        };

        match known {
            Ok(true) => true,
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "accepting unknown host key (trust-on-first-use)"
                );
                let learned = match &self.known_hosts_path {
                    Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
                    None => learn_known_hosts(&self.host, self.port, key),
                };
                if let Err(e) = learned {
                    tracing::warn!("could not record host key in known_hosts: {e}");
                }
                true
            }
            Ok(false) => false,
            // A changed key is never acceptable, trust-on-first-use or not.
            Err(russh::keys::Error::KeyChanged { .. }) => false,
            Err(_) => self.trust_on_first_use,
        }
    }
}

impl client::Handler for HostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.verify(server_public_key))
    }
}

/// Connects [`SshTransport`] sessions.
pub struct SshConnector {
    options: TransportOptions,
}

impl SshConnector {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(
        &self,
        target: &TargetConfig,
        user: &str,
        credential: &Credential,
    ) -> Result<Self::Transport> {
        SshTransport::connect(target, user, credential, self.options.clone()).await
    }
}

/// An open SSH session implementing [`Transport`].
pub struct SshTransport {
    handle: Arc<Handle<HostKeyHandler>>,
    options: TransportOptions,
    closed: Mutex<bool>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("handle", &"<russh::Handle>")
            .field("closed", &*self.closed.lock())
            .finish()
    }
}

impl SshTransport {
    pub async fn connect(
        target: &TargetConfig,
        user: &str,
        credential: &Credential,
        options: TransportOptions,
    ) -> Result<Self> {
        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let handler = HostKeyHandler {
            host: target.host.clone(),
            port: target.port,
            trust_on_first_use: options.trust_on_first_use,
            known_hosts_path: options.known_hosts_path.clone(),
        };

        let connect = client::connect(
            Arc::new(russh_config),
            (target.host.as_str(), target.port),
            handler,
        );
        let mut handle = tokio::time::timeout(options.connect_timeout, connect)
            .await
            .map_err(|_| Error::ConnectTimeout(options.connect_timeout))?
            .map_err(|e| {
                Error::Network(format!("connecting to {}:{}: {e}", target.host, target.port))
            })?;

        if !authenticate(&mut handle, user, credential).await? {
            return Err(Error::Auth);
        }

        Ok(Self {
            handle: Arc::new(handle),
            options,
            closed: Mutex::new(false),
        })
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Network(format!("failed to open channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Network(format!("failed to exec command: {e}")))?;

        drain_channel(&mut channel).await
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        match tokio::time::timeout(self.options.command_timeout, self.exec_inner(command)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(self.options.command_timeout)),
        }
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        on_progress: ProgressFn<'_>,
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(local).await?;
        let total = file.metadata().await?.len();
        let mut tracker = ProgressTracker::new(total);

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Network(format!("failed to open channel: {e}")))?;

        // `cat` keeps the remote side dumb: the file arrives exactly as the
        // channel delivers it, no transfer protocol on top of the session.
        let sink = format!("cat > {}", sh_quote(remote));
        channel
            .exec(true, sink.as_str())
            .await
            .map_err(|e| Error::Network(format!("failed to start remote write: {e}")))?;

        let mut buf = vec![0u8; self.options.chunk_size.max(1)];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            let write = channel.data(&buf[..n]);
            match tokio::time::timeout(self.options.chunk_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(Error::TransferInterrupted {
                        sent: tracker.sent(),
                        total,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(Error::TransferInterrupted {
                        sent: tracker.sent(),
                        total,
                        reason: format!(
                            "no progress within {:?}",
                            self.options.chunk_timeout
                        ),
                    });
                }
            }

            on_progress(tracker.advance(n as u64));
        }

        if let Some(terminal) = tracker.finish() {
            on_progress(terminal);
        }

        channel.eof().await.map_err(|e| Error::TransferInterrupted {
            sent: tracker.sent(),
            total,
            reason: format!("closing channel: {e}"),
        })?;

        let output = drain_channel(&mut channel)
            .await
            .map_err(|e| Error::TransferInterrupted {
                sent: tracker.sent(),
                total,
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(Error::TransferInterrupted {
                sent: tracker.sent(),
                total,
                reason: format!(
                    "remote write exited {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut closed = self.closed.lock();
            if *closed {
                return Ok(());
            }
            *closed = true;
        }

        // A failed session may refuse the disconnect message; the underlying
        // resources are released either way, so this never escalates.
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("disconnect after session failure: {e}");
        }
        Ok(())
    }
}

/// Collect stdout, stderr, and the exit status from an exec channel.
async fn drain_channel(
    channel: &mut russh::Channel<russh::client::Msg>,
) -> Result<CommandOutput> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;
    let mut got_eof = false;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
            Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                stderr.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status);
                if got_eof {
                    break;
                }
            }
            Some(ChannelMsg::Eof) => {
                got_eof = true;
                if exit_code.is_some() {
                    break;
                }
            }
            Some(ChannelMsg::Close) => break,
            Some(_) => {}
            None => break,
        }
    }

    // No exit status means the session died under the command.
    let exit_code = exit_code.ok_or(Error::ChannelClosed)?;

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    })
}

/// Run the authentication exchange for the resolved credential.
async fn authenticate(
    handle: &mut Handle<HostKeyHandler>,
    user: &str,
    credential: &Credential,
) -> Result<bool> {
    match credential {
        Credential::Password(password) => {
            let result = handle
                .authenticate_password(user, password)
                .await
                .map_err(Error::Protocol)?;
            Ok(result.success())
        }
        Credential::KeyFile { path, passphrase } => {
            let key = load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                Error::KeyLoadFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;

            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(Error::Protocol)?
                .flatten();

            let result = handle
                .authenticate_publickey(
                    user,
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await
                .map_err(Error::Protocol)?;
            Ok(result.success())
        }
        Credential::Agent => {
            let mut agent = AgentClient::connect_env()
                .await
                .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

            let keys = agent
                .request_identities()
                .await
                .map_err(|e| Error::AgentUnavailable(format!("failed to list agent keys: {e}")))?;

            if keys.is_empty() {
                return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
            }

            for key in &keys {
                match handle
                    .authenticate_publickey_with(user, key.clone(), None, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => return Ok(true),
                    _ => continue,
                }
            }
            Ok(false)
        }
    }
}
