use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Every forwarder built here terminates on the loopback interface of the test host.
pub const LOCALHOST: &str = "localhost";

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Failed to spawn SSH process: {0}")]
    Spawn(std::io::Error),
    #[error("Forwarded port {port} did not respond within {timeout:?}")]
    Timeout { port: u16, timeout: Duration },
    #[error("No http port pair was supplied")]
    MissingHttpPair,
    #[error("SSH process exited unexpectedly: {0}")]
    UnexpectedExit(String),
    #[error("SSH process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid port pair '{0}', expected LOCAL:REMOTE")]
pub struct ParsePortPairError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid forwarding direction '{0}', expected R or L")]
pub struct ParseDirectionError(pub String);

/// A local and a remote port for one forwarded service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub local_port: u16,
    pub remote_port: u16,
}

impl PortPair {
    pub fn new(local_port: u16, remote_port: u16) -> Self {
        Self { local_port, remote_port }
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local_port, self.remote_port)
    }
}

impl FromStr for PortPair {
    type Err = ParsePortPairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePortPairError(s.to_string());
        let (local, remote) = s.trim().split_once(':').ok_or_else(err)?;
        let local_port = local.parse::<u16>().map_err(|_| err())?;
        let remote_port = remote.parse::<u16>().map_err(|_| err())?;
        Ok(Self { local_port, remote_port })
    }
}

/// The named service slots a forwarder can carry. Unused slots stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortPairs {
    pub http: Option<PortPair>,
    pub https: Option<PortPair>,
    pub dns: Option<PortPair>,
}

impl PortPairs {
    pub fn http_only(pair: PortPair) -> Self {
        Self { http: Some(pair), ..Default::default() }
    }

    /// Present pairs in slot order: http, https, dns.
    pub fn iter(&self) -> impl Iterator<Item = PortPair> + '_ {
        [self.http, self.https, self.dns].into_iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Which side of the tunnel listens: `Remote` maps to `ssh -R`, `Local` to `ssh -L`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForwardingDirection {
    #[default]
    Remote,
    Local,
}

impl ForwardingDirection {
    pub fn flag(self) -> char {
        match self {
            ForwardingDirection::Remote => 'R',
            ForwardingDirection::Local => 'L',
        }
    }

    /// The `-R`/`-L` argument forwarding a single pair.
    ///
    /// The listening port always comes first: the remote port for `-R`, the local port for `-L`.
    pub fn forwarding_arg(self, pair: PortPair) -> String {
        let (listen, target) = match self {
            ForwardingDirection::Remote => (pair.remote_port, pair.local_port),
            ForwardingDirection::Local => (pair.local_port, pair.remote_port),
        };
        format!("-{}{}:{}:{}", self.flag(), listen, LOCALHOST, target)
    }

    /// The port on the listening side of `pair`.
    pub fn listening_port(self, pair: PortPair) -> u16 {
        match self {
            ForwardingDirection::Remote => pair.remote_port,
            ForwardingDirection::Local => pair.local_port,
        }
    }
}

impl fmt::Display for ForwardingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl FromStr for ForwardingDirection {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "remote" => Ok(ForwardingDirection::Remote),
            "l" | "local" => Ok(ForwardingDirection::Local),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// One forwarding argument per present pair, in slot order.
pub fn forwarding_args(port_pairs: &PortPairs, direction: ForwardingDirection) -> Vec<String> {
    port_pairs
        .iter()
        .map(|pair| direction.forwarding_arg(pair))
        .collect()
}

/// Lifecycle of a tunnelling forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderState {
    Unstarted,
    Starting,
    Running,
    Closed,
}

/// Bound and cadence of the readiness wait after the tunnel process is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
        }
    }
}

/// Port-pair storage and teardown shared by every forwarder.
#[derive(Debug, Clone)]
pub struct ForwarderBase {
    port_pairs: PortPairs,
    http: PortPair,
    closed: bool,
}

impl ForwarderBase {
    pub fn new(port_pairs: PortPairs) -> Result<Self, ForwardError> {
        let http = port_pairs.http.ok_or(ForwardError::MissingHttpPair)?;
        Ok(Self {
            port_pairs,
            http,
            closed: false,
        })
    }

    pub fn port_pairs(&self) -> &PortPairs {
        &self.port_pairs
    }

    pub fn http(&self) -> PortPair {
        self.http
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if !self.closed {
            debug!("Released port pairs {:?}", self.port_pairs);
            self.closed = true;
        }
    }
}

/// A forwarded endpoint the test host can reach.
#[async_trait]
pub trait Forwarder: Send {
    fn host_ip(&self) -> &str {
        LOCALHOST
    }
    fn host_port(&self) -> u16;
    fn port_pairs(&self) -> &PortPairs;
    /// Tears the forwarder down. Calling it again is a no-op.
    async fn close(&mut self);
    /// Resolves when the forwarding transport goes away on its own.
    async fn wait_exit(&mut self) -> Result<(), ForwardError> {
        std::future::pending().await
    }
}

/// Picks the forwarder implementation appropriate for the target connection.
#[async_trait]
pub trait ForwarderFactory: Send + Sync {
    fn host_ip(&self) -> &str {
        LOCALHOST
    }
    async fn create(
        &self,
        port_pairs: PortPairs,
        direction: ForwardingDirection,
    ) -> Result<Box<dyn Forwarder>, ForwardError>;
}
