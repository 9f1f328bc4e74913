use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;

use sshfwd_traits::forward::WaitPolicy;
use sshfwd_traits::remote::RemoteConnection;

/// A connection whose "ssh" is a plain local `sleep`, recording what it was asked to run.
pub struct FakeRemote {
    pub local: bool,
    pub program: Vec<String>,
    /// Probe calls that fail before the probe starts succeeding. `None` never succeeds.
    pub ready_after: Option<usize>,
    pub probes: AtomicUsize,
    pub probed_ports: Mutex<Vec<u16>>,
    pub command_lines: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl FakeRemote {
    pub fn remote() -> Self {
        Self {
            local: false,
            program: vec!["sleep".to_string(), "30".to_string()],
            ready_after: Some(0),
            probes: AtomicUsize::new(0),
            probed_ports: Mutex::new(Vec::new()),
            command_lines: Mutex::new(Vec::new()),
        }
    }

    pub fn local() -> Self {
        Self { local: true, ..Self::remote() }
    }

    pub fn never_ready() -> Self {
        Self { ready_after: None, ..Self::remote() }
    }

    pub fn with_program(program: &[&str]) -> Self {
        Self {
            program: program.iter().map(|s| s.to_string()).collect(),
            ..Self::remote()
        }
    }

    pub fn forwarding_args(&self) -> Vec<Vec<String>> {
        self.command_lines
            .lock()
            .unwrap()
            .iter()
            .map(|(_, extra)| extra.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteConnection for FakeRemote {
    fn is_local(&self) -> bool {
        self.local
    }

    fn form_ssh_command_line(&self, remote_command: &[&str], extra_args: &[String]) -> Vec<String> {
        let remote_command = remote_command.iter().map(|s| s.to_string()).collect();
        self.command_lines
            .lock()
            .unwrap()
            .push((remote_command, extra_args.to_vec()));
        self.program.clone()
    }

    async fn is_http_server_running_on_port(&self, port: u16) -> bool {
        self.probed_ports.lock().unwrap().push(port);
        let attempt = self.probes.fetch_add(1, Ordering::SeqCst);
        self.ready_after.is_some_and(|after| attempt >= after)
    }
}

pub fn short_policy() -> WaitPolicy {
    WaitPolicy {
        timeout: Duration::from_millis(300),
        min_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
    }
}
