//! Terminal outcome of a pairing attempt

use super::keys::DistributedKeys;
use super::types::{Code, PairingFailedReason};
use crate::gap::AddressWithType;
use thiserror::Error;

/// Successful pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingResult {
    pub connection_address: AddressWithType,
    pub distributed_keys: DistributedKeys,
    /// Negotiated encryption key size in octets
    pub key_size: u8,
    /// Whether LE Secure Connections was used
    pub secure_connections: bool,
}

/// Failed pairing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PairingFailure {
    pub message: String,
    /// Reason sent to, or received from, the peer
    pub reason: Option<PairingFailedReason>,
    /// SMP code of the PDU that caused the failure
    pub received_code: Option<Code>,
}

impl PairingFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
            received_code: None,
        }
    }

    pub fn with_reason(message: impl Into<String>, reason: PairingFailedReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(message)
        }
    }

    pub fn with_received_code(message: impl Into<String>, received_code: Code) -> Self {
        Self {
            received_code: Some(received_code),
            ..Self::new(message)
        }
    }

    /// Whether the peer ended the pairing with a Pairing Failed PDU
    pub fn is_remote(&self) -> bool {
        self.received_code == Some(Code::PairingFailed)
    }
}

/// What the terminal callback receives
pub type PairingOutcome = Result<PairingResult, PairingFailure>;
