// ABOUTME: Shared test support: in-memory transport and connector mocks.
// ABOUTME: Records every transport call so tests can assert exact command text.

use async_trait::async_trait;
use parking_lot::Mutex;
use skiff::config::{Config, TargetConfig};
use skiff::credential::Credential;
use skiff::transport::{
    CommandOutput, Connector, Error, ProgressFn, ProgressTracker, Result, Transport,
};
use std::path::Path;
use std::sync::Arc;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Exec(String),
    Upload { remote: String },
    Close,
}

pub type CallLog = Arc<Mutex<Vec<Recorded>>>;

/// A scripted in-memory transport.
///
/// `exec` answers from the command text: port lookups return
/// `lsof_stdout`, kills and launches return the configured exit codes,
/// everything else succeeds. `upload` streams the real local file through
/// the progress tracker in small chunks.
pub struct MockTransport {
    pub log: CallLog,
    pub lsof_stdout: String,
    pub kill_exit_code: u32,
    pub launch_exit_code: u32,
    pub interrupt_upload: bool,
}

impl MockTransport {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            lsof_stdout: String::new(),
            kill_exit_code: 0,
            launch_exit_code: 0,
            interrupt_upload: false,
        }
    }
}

fn ok_output(exit_code: u32, stdout: String) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout,
        stderr: String::new(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.log.lock().push(Recorded::Exec(command.to_string()));

        if command.starts_with("lsof") {
            // lsof exits 1 when nothing matches the port filter
            return if self.lsof_stdout.is_empty() {
                Ok(ok_output(1, String::new()))
            } else {
                Ok(ok_output(0, self.lsof_stdout.clone()))
            };
        }
        if command.starts_with("kill") {
            return Ok(ok_output(self.kill_exit_code, String::new()));
        }
        if command.contains("nohup") {
            return Ok(ok_output(self.launch_exit_code, String::new()));
        }
        Ok(ok_output(0, String::new()))
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        on_progress: ProgressFn<'_>,
    ) -> Result<()> {
        self.log.lock().push(Recorded::Upload {
            remote: remote.to_string(),
        });

        let data = std::fs::read(local)?;
        let total = data.len() as u64;
        let mut tracker = ProgressTracker::new(total);

        if self.interrupt_upload {
            let sent = total / 2;
            if sent > 0 {
                on_progress(tracker.advance(sent));
            }
            return Err(Error::TransferInterrupted {
                sent,
                total,
                reason: "connection reset by mock".to_string(),
            });
        }

        for chunk in data.chunks(7) {
            on_progress(tracker.advance(chunk.len() as u64));
        }
        if let Some(terminal) = tracker.finish() {
            on_progress(terminal);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.log.lock().push(Recorded::Close);
        Ok(())
    }
}

/// Hands out a prepared transport, or refuses the connection.
pub struct MockConnector {
    transport: Mutex<Option<MockTransport>>,
    fail_connect: bool,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            fail_connect: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            transport: Mutex::new(None),
            fail_connect: true,
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(
        &self,
        _target: &TargetConfig,
        _user: &str,
        _credential: &Credential,
    ) -> Result<Self::Transport> {
        if self.fail_connect {
            return Err(Error::Auth);
        }
        Ok(self
            .transport
            .lock()
            .take()
            .expect("connect called more than once"))
    }
}

/// Configuration matching the canonical deploy scenario:
/// service `bin-x`, remote directory `/srv/app`, app port 8080.
pub fn scenario_config() -> Config {
    Config::from_yaml(
        r#"
service: bin-x
artifact: ./bin-x
target:
  host: 192.0.2.10
  port: 22
  user: deploy
  directory: /srv/app
app_port: 8080
env_setup: ". ./.env"
"#,
    )
    .expect("scenario config parses")
}
