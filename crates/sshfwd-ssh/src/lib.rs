//! SSH-tunnelled port forwarding to a device under test.
//!
//! [`SshForwarderFactory`] hands out a [`DoNothingForwarder`] when the device is the
//! test host itself, and otherwise an [`SshForwarder`] that keeps an `ssh -R`/`-L`
//! session open until it is closed.

mod factory;
mod forwarder;
mod noop;
mod remote;
mod wait;

#[cfg(test)]
mod testing;

pub use factory::SshForwarderFactory;
pub use forwarder::{SshForwarder, KEEP_ALIVE_COMMAND};
pub use noop::DoNothingForwarder;
pub use remote::SshRemoteConnection;
pub use wait::wait_for;

pub use sshfwd_traits::forward::{
    Forwarder, ForwarderFactory, ForwarderState, ForwardError, ForwardingDirection, PortPair,
    PortPairs, WaitPolicy,
};
pub use sshfwd_traits::remote::RemoteConnection;
