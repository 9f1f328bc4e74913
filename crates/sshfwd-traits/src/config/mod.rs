use std::path::{Path, PathBuf};
use std::time::Duration;
use merge::Merge;
use serde::Deserialize;
use thiserror::Error;

use crate::forward::{
    ForwardingDirection, ParseDirectionError, ParsePortPairError, PortPair, PortPairs, WaitPolicy,
};

/// A custom merge strategy for `Option<T>` fields. It overwrites the destination
/// (`left`) with the source (`right`) only if the source is `Some`.
fn overwrite_if_some<T>(left: &mut Option<T>, right: Option<T>) {
    if right.is_some() {
        *left = right;
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at any of the expected locations")]
    NotFound,
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidPortPair(#[from] ParsePortPairError),
    #[error(transparent)]
    InvalidDirection(#[from] ParseDirectionError),
}

#[derive(Deserialize, Merge, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Device address. Unset or a loopback name means the device is the test host.
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub hostname: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub ssh_port: Option<u16>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub ssh_username: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub ssh_identity: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub ssh_binary: Option<String>,
    /// Port pairs written as `"LOCAL:REMOTE"`.
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub http: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub https: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub dns: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub direction: Option<String>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub ready_timeout_secs: Option<u64>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[merge(strategy = overwrite_if_some)]
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: None,
            ssh_port: Some(22),
            ssh_username: Some("root".to_string()),
            ssh_identity: None,
            ssh_binary: Some("ssh".to_string()),
            http: None,
            https: None,
            dns: None,
            direction: Some("R".to_string()),
            ready_timeout_secs: Some(60),
            poll_interval_ms: Some(100),
            log_level: Some("info".to_string()),
        }
    }
}

impl Config {
    /// A layer with every field unset, used when no config file exists.
    pub fn empty() -> Self {
        Self {
            hostname: None, ssh_port: None, ssh_username: None, ssh_identity: None,
            ssh_binary: None, http: None, https: None, dns: None, direction: None,
            ready_timeout_secs: None, poll_interval_ms: None, log_level: None,
        }
    }

    pub fn port_pairs(&self) -> Result<PortPairs, ConfigError> {
        fn parse(slot: &Option<String>) -> Result<Option<PortPair>, ConfigError> {
            slot.as_deref().map(str::parse::<PortPair>).transpose().map_err(ConfigError::from)
        }

        Ok(PortPairs {
            http: parse(&self.http)?,
            https: parse(&self.https)?,
            dns: parse(&self.dns)?,
        })
    }

    pub fn direction(&self) -> Result<ForwardingDirection, ConfigError> {
        match self.direction.as_deref() {
            Some(flag) => Ok(flag.parse::<ForwardingDirection>()?),
            None => Ok(ForwardingDirection::default()),
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        let mut policy = WaitPolicy::default();
        if let Some(secs) = self.ready_timeout_secs {
            policy.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.poll_interval_ms {
            policy.min_interval = Duration::from_millis(ms);
            policy.max_interval = policy.max_interval.max(policy.min_interval);
        }
        policy
    }
}

pub trait ConfigService {
    fn load_from_paths() -> Result<Config, ConfigError>;
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError>;
    fn expand_tilde<P: AsRef<Path>>(path: P) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_pairs_from_config() {
        let config = Config {
            http: Some("5000:6000".to_string()),
            dns: Some("5353:53".to_string()),
            ..Default::default()
        };
        let pairs = config.port_pairs().unwrap();
        assert_eq!(pairs.http, Some(PortPair::new(5000, 6000)));
        assert_eq!(pairs.https, None);
        assert_eq!(pairs.dns, Some(PortPair::new(5353, 53)));

        let bad = Config {
            https: Some("443".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.port_pairs(), Err(ConfigError::InvalidPortPair(_))));
    }

    #[test]
    fn test_direction_from_config() {
        assert_eq!(Config::default().direction().unwrap(), ForwardingDirection::Remote);
        assert_eq!(Config::empty().direction().unwrap(), ForwardingDirection::Remote);

        let local = Config {
            direction: Some("L".to_string()),
            ..Default::default()
        };
        assert_eq!(local.direction().unwrap(), ForwardingDirection::Local);

        let bad = Config {
            direction: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.direction(), Err(ConfigError::InvalidDirection(_))));
    }

    #[test]
    fn test_wait_policy_from_config() {
        assert_eq!(Config::default().wait_policy().timeout, Duration::from_secs(60));

        let config = Config {
            ready_timeout_secs: Some(5),
            poll_interval_ms: Some(10_000),
            ..Default::default()
        };
        let policy = config.wait_policy();
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.min_interval, Duration::from_secs(10));
        assert_eq!(policy.max_interval, Duration::from_secs(10));
    }
}
