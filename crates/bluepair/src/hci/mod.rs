//! Bluetooth HCI (Host Controller Interface) packets
//!
//! Commands the pairing handler sends to start or answer link encryption,
//! and views over the events that report the outcome.

pub mod constants;
pub mod packet;

#[cfg(test)]
mod tests;

pub use packet::{
    EncryptionChange, EncryptionEnabled, EncryptionKeyRefreshComplete, ErrorCode, HciCommand,
    HciEvent, LeLongTermKeyRequest,
};
