use async_trait::async_trait;
use tracing::{debug, warn};

use sshfwd_traits::forward::{ForwardError, Forwarder, ForwarderBase, PortPairs};

/// Used when the device is the test host: ports are already reachable as-is.
#[derive(Debug)]
pub struct DoNothingForwarder {
    base: ForwarderBase,
}

impl DoNothingForwarder {
    pub fn new(port_pairs: PortPairs) -> Result<Self, ForwardError> {
        let base = ForwarderBase::new(port_pairs)?;
        for pair in port_pairs.iter() {
            if pair.local_port != pair.remote_port {
                warn!(
                    "Port pair {} is not forwarded on a local device; remote port {} stays unreachable",
                    pair, pair.remote_port
                );
            }
        }
        debug!("No forwarding needed for {:?}", port_pairs);
        Ok(Self { base })
    }
}

#[async_trait]
impl Forwarder for DoNothingForwarder {
    fn host_port(&self) -> u16 {
        self.base.http().local_port
    }

    fn port_pairs(&self) -> &PortPairs {
        self.base.port_pairs()
    }

    async fn close(&mut self) {
        self.base.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshfwd_traits::forward::PortPair;

    #[tokio::test]
    async fn test_echoes_local_port() {
        let mut forwarder =
            DoNothingForwarder::new(PortPairs::http_only(PortPair::new(5000, 6000))).unwrap();
        assert_eq!(forwarder.host_ip(), "localhost");
        assert_eq!(forwarder.host_port(), 5000);

        forwarder.close().await;
        forwarder.close().await;
        assert_eq!(forwarder.host_port(), 5000);
    }

    #[test]
    fn test_requires_http_pair() {
        assert!(matches!(
            DoNothingForwarder::new(PortPairs::default()),
            Err(ForwardError::MissingHttpPair)
        ));
    }
}
