use std::io;
use std::process::Stdio;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn, Level};

use sshfwd_traits::forward::{
    forwarding_args, ForwardError, Forwarder, ForwarderBase, ForwarderState, ForwardingDirection,
    PortPairs, WaitPolicy, LOCALHOST,
};
use sshfwd_traits::remote::RemoteConnection;

use crate::wait::wait_for;

/// The remote command that keeps the ssh session, and with it the tunnel, alive.
pub const KEEP_ALIVE_COMMAND: [&str; 2] = ["sleep", "999999999"];

/// Port forwarding held open by an `ssh` child process.
pub struct SshForwarder {
    base: ForwarderBase,
    direction: ForwardingDirection,
    forwarding_args: Vec<String>,
    process: Option<Child>,
    state: ForwarderState,
}

impl SshForwarder {
    /// Spawns the tunnel and waits until the forwarded http port answers.
    ///
    /// On failure the returned error owns nothing: a child that was already
    /// spawned is killed when the half-built forwarder is dropped.
    pub async fn start(
        remote: &dyn RemoteConnection,
        direction: ForwardingDirection,
        port_pairs: PortPairs,
        policy: &WaitPolicy,
    ) -> Result<Self, ForwardError> {
        let base = ForwarderBase::new(port_pairs)?;
        let mut forwarder = Self {
            base,
            direction,
            forwarding_args: forwarding_args(&port_pairs, direction),
            process: None,
            state: ForwarderState::Unstarted,
        };

        forwarder.spawn(remote)?;

        let port = forwarder.host_port();
        wait_for(policy, move || remote.is_http_server_running_on_port(port))
            .await
            .map_err(|_| {
                warn!("Forwarded port {} did not answer within {:?}", port, policy.timeout);
                ForwardError::Timeout { port, timeout: policy.timeout }
            })?;

        debug!("Server started on {}:{}", LOCALHOST, port);
        Ok(forwarder)
    }

    fn spawn(&mut self, remote: &dyn RemoteConnection) -> Result<(), ForwardError> {
        self.state = ForwarderState::Starting;

        let command_line = remote.form_ssh_command_line(&KEEP_ALIVE_COMMAND, &self.forwarding_args);
        let (program, args) = command_line.split_first().ok_or_else(|| {
            ForwardError::Spawn(io::Error::new(
                io::ErrorKind::InvalidInput,
                "SSH command line is empty",
            ))
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Spawning SSH command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(ForwardError::Spawn)?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_lines(stdout, Level::DEBUG));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_lines(stderr, Level::WARN));
        }

        self.process = Some(child);
        self.state = ForwarderState::Running;
        Ok(())
    }

    pub fn direction(&self) -> ForwardingDirection {
        self.direction
    }

    pub fn state(&self) -> ForwarderState {
        self.state
    }

    pub fn forwarding_args(&self) -> &[String] {
        &self.forwarding_args
    }

    /// OS process id of the ssh child, while one is held.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }
}

/// Forwards a child's output into the log so its pipe never fills up.
async fn log_lines<R: AsyncRead + Unpin>(stream: R, level: Level) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if level == Level::WARN {
            warn!("[ssh] {}", line);
        } else {
            debug!("[ssh] {}", line);
        }
    }
}

#[async_trait]
impl Forwarder for SshForwarder {
    /// The port on the listening end of the http pair: remote for `-R`, local for `-L`.
    fn host_port(&self) -> u16 {
        self.direction.listening_port(self.base.http())
    }

    fn port_pairs(&self) -> &PortPairs {
        self.base.port_pairs()
    }

    async fn close(&mut self) {
        if let Some(mut child) = self.process.take() {
            info!("Terminating SSH forwarding process...");
            if let Err(e) = child.kill().await {
                error!("Failed to kill SSH subprocess: {}", e);
            }
        }
        self.state = ForwarderState::Closed;
        self.base.close();
    }

    async fn wait_exit(&mut self) -> Result<(), ForwardError> {
        let Some(child) = self.process.as_mut() else {
            return Ok(());
        };
        let status = child.wait().await?;
        self.process = None;

        if status.success() {
            info!("SSH process exited gracefully.");
            Ok(())
        } else {
            error!("SSH process exited with status: {}", status);
            Err(ForwardError::UnexpectedExit(status.to_string()))
        }
    }
}
