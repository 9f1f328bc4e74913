use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

use sshfwd_traits::config::Config;
use sshfwd_traits::remote::RemoteConnection;

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Options passed to every ssh invocation. The device is a throwaway test
/// target, so host keys are neither checked nor remembered.
const SSH_OPTIONS: [&str; 5] = [
    "ForwardX11=no",
    "ForwardX11Trusted=no",
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "LogLevel=quiet",
];

/// A device reached through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshRemoteConnection {
    hostname: Option<String>,
    ssh_port: u16,
    username: String,
    identity: Option<PathBuf>,
    ssh_binary: String,
    probe_timeout: Duration,
}

impl SshRemoteConnection {
    pub fn new(config: &Config) -> Self {
        Self {
            hostname: config.hostname.clone(),
            ssh_port: config.ssh_port.unwrap_or(22),
            username: config.ssh_username.clone().unwrap_or_else(|| "root".to_string()),
            identity: config.ssh_identity.as_ref().map(PathBuf::from),
            ssh_binary: config.ssh_binary.clone().unwrap_or_else(|| "ssh".to_string()),
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or("localhost")
    }

    /// `wget` run on the device against its own loopback.
    fn probe_command(port: u16) -> Vec<String> {
        vec![
            "wget".to_string(),
            "-q".to_string(),
            "-O".to_string(),
            "/dev/null".to_string(),
            "-T1".to_string(),
            "-t1".to_string(),
            format!("http://localhost:{}", port),
        ]
    }
}

#[async_trait]
impl RemoteConnection for SshRemoteConnection {
    fn is_local(&self) -> bool {
        match self.hostname.as_deref() {
            None => true,
            Some(host) => LOOPBACK_HOSTS.contains(&host.trim().to_ascii_lowercase().as_str()),
        }
    }

    fn form_ssh_command_line(&self, remote_command: &[&str], extra_args: &[String]) -> Vec<String> {
        let mut args = vec![self.ssh_binary.clone()];
        for option in SSH_OPTIONS {
            args.push("-o".to_string());
            args.push(option.to_string());
        }
        // Keep ssh off our stdin.
        args.push("-n".to_string());
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args.push("-p".to_string());
        args.push(self.ssh_port.to_string());
        args.extend(extra_args.iter().cloned());
        args.push(format!("{}@{}", self.username, self.hostname()));
        args.extend(remote_command.iter().map(|part| part.to_string()));
        args
    }

    async fn is_http_server_running_on_port(&self, port: u16) -> bool {
        let probe = Self::probe_command(port);
        let probe: Vec<&str> = probe.iter().map(String::as_str).collect();
        let command_line = self.form_ssh_command_line(&probe, &[]);
        let Some((program, args)) = command_line.split_first() else {
            return false;
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.probe_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("HTTP probe of port {} could not run: {}", port, e);
                return false;
            }
            Err(_) => {
                trace!("HTTP probe of port {} timed out", port);
                return false;
            }
        };

        if output.status.success() {
            return true;
        }
        // An HTTP error status still means a server answered.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let answered = stderr.contains("server returned error");
        trace!("HTTP probe of port {}: {} ({})", port, output.status, stderr.trim());
        answered
    }
}
