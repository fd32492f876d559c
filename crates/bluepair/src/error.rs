//! Error types for the bluepair library
//!
//! Codec failures surface as [`PacketError`]; misuse of the security manager
//! API surfaces as [`SmpError`]. Failures of the pairing procedure itself are
//! reported through [`crate::smp::PairingFailure`].

use crate::gap::BdAddr;
use thiserror::Error;

/// Errors produced while decoding SMP PDUs or HCI events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Empty packet")]
    Empty,

    #[error("Unknown SMP command code 0x{0:02x}")]
    UnknownCode(u8),

    #[error("Invalid {name} length: expected {expected}, got {actual}")]
    InvalidLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value 0x{value:02x} for {field}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Unexpected HCI event code 0x{0:02x}")]
    UnexpectedEvent(u8),
}

/// Errors returned by the security manager API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmpError {
    #[error("Pairing already in progress with {0}")]
    AlreadyPairing(BdAddr),

    #[error("No pairing in progress with {0}")]
    NotPairing(BdAddr),

    #[error("Unknown connection handle 0x{0:04x}")]
    UnknownConnection(u16),

    #[error("Invalid packet: {0}")]
    Packet(#[from] PacketError),
}
