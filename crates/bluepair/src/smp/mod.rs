//! Security Manager Protocol (SMP) implementation
//!
//! This module implements LE pairing, which is responsible for:
//! - Negotiating pairing features with the peer
//! - Authenticating the peer with legacy pairing or LE Secure Connections
//! - Generating the encryption key and starting link encryption
//! - Distributing the long term, identity and signing keys
//!
//! [`PairingHandlerLe`] runs one pairing attempt; [`SecurityManager`] owns
//! the attempts of all connections.

pub mod constants;
pub mod crypto;
mod handler;
mod keys;
mod manager;
mod pdu;
mod result;
mod transport;
mod types;
mod ui;

#[cfg(test)]
mod tests;

// Re-export public API
pub use self::handler::*;
pub use self::keys::*;
pub use self::manager::{LeConnection, LocalDevice, PairingResults, SecurityManager};
pub use self::pdu::*;
pub use self::result::*;
pub use self::transport::PairingTransport;
pub use self::types::*;
pub use self::ui::*;
