//! bluepair - Bluetooth LE pairing for Rust
//!
//! This library implements the LE Security Manager: the pairing state
//! machine that runs over the SMP fixed channel, its cryptographic toolbox,
//! and the HCI commands and events used to encrypt the link with the
//! resulting key. Sending and receiving packets is left to the host stack
//! through the [`smp::PairingTransport`] and [`smp::UserInterface`] traits.

pub mod config;
pub mod error;
pub mod gap;
pub mod hci;
pub mod smp;

// Re-export common types for convenience
pub use config::PairingConfig;
pub use error::{PacketError, SmpError};
pub use gap::{AddressType, AddressWithType, BdAddr, Role};
pub use hci::{HciCommand, HciEvent};
pub use smp::{
    InitialInformations, PairingFailure, PairingHandle, PairingHandlerLe, PairingOutcome,
    PairingResult, SecurityManager,
};
