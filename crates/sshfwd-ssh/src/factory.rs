use std::sync::Arc;
use async_trait::async_trait;
use tracing::{debug, info};

use sshfwd_traits::forward::{
    ForwardError, Forwarder, ForwarderFactory, ForwardingDirection, PortPairs, WaitPolicy,
};
use sshfwd_traits::remote::RemoteConnection;

use crate::forwarder::SshForwarder;
use crate::noop::DoNothingForwarder;

/// Creates ssh tunnels to a remote device, or pass-through forwarders for a local one.
pub struct SshForwarderFactory {
    remote: Arc<dyn RemoteConnection>,
    policy: WaitPolicy,
}

impl SshForwarderFactory {
    pub fn new(remote: Arc<dyn RemoteConnection>, policy: WaitPolicy) -> Self {
        Self { remote, policy }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }
}

#[async_trait]
impl ForwarderFactory for SshForwarderFactory {
    async fn create(
        &self,
        port_pairs: PortPairs,
        direction: ForwardingDirection,
    ) -> Result<Box<dyn Forwarder>, ForwardError> {
        if self.remote.is_local() {
            debug!("Device is local, skipping SSH forwarding");
            return Ok(Box::new(DoNothingForwarder::new(port_pairs)?));
        }

        let forwarder =
            SshForwarder::start(self.remote.as_ref(), direction, port_pairs, &self.policy).await?;
        info!(
            "Forwarding {} ports through {}:{}",
            direction,
            self.host_ip(),
            forwarder.host_port()
        );
        Ok(Box::new(forwarder))
    }
}
