use async_trait::async_trait;

/// The connection details of the device under test, as seen by a forwarder.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// True when the device is the test host itself and no tunnel is needed.
    fn is_local(&self) -> bool;

    /// Builds the full argument vector of an ssh invocation running `remote_command`,
    /// with `extra_args` placed before the destination.
    fn form_ssh_command_line(&self, remote_command: &[&str], extra_args: &[String]) -> Vec<String>;

    /// A single probe of whether something answers HTTP on the host's `port`.
    async fn is_http_server_running_on_port(&self, port: u16) -> bool;
}
