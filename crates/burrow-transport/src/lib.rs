//! Tunnel abstraction layer
//!
//! Defines the capability contract every tunnel protocol implements
//! ([`Tunnel`]), the secure-channel seam the forwarding engine dials through
//! ([`SecureChannel`] / [`ChannelSession`]), and the [`TunnelRegistry`] that
//! maps protocol names to constructors.

mod channel;
mod error;
mod registry;
mod tunnel;

pub use channel::{ChannelSession, ForwardStream, ForwardStreamIo, SecureChannel};
pub use error::{ChannelError, ChannelResult, TunnelError, TunnelResult};
pub use registry::{TunnelFactory, TunnelRegistry};
pub use tunnel::{Tunnel, TunnelState};

#[cfg(test)]
mod tests;
