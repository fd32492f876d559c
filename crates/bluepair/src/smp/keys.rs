//! Key material exchanged and derived during pairing
//!
//! Keys are kept in wire (little-endian) octet order.

use super::constants::{SMP_MAX_ENCRYPTION_KEY_SIZE, SMP_MIN_ENCRYPTION_KEY_SIZE};
use crate::gap::AddressWithType;

/// Keys exchanged in the key distribution phase
///
/// Built incrementally while keys are sent and received. A `None` field was
/// not distributed in that direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributedKeys {
    /// Long Term Key received from the peer
    pub remote_ltk: Option<[u8; 16]>,
    pub remote_ediv: Option<u16>,
    pub remote_rand: Option<[u8; 8]>,
    pub remote_identity_address: Option<AddressWithType>,
    /// Identity Resolving Key received from the peer
    pub remote_irk: Option<[u8; 16]>,
    /// Connection Signature Resolving Key received from the peer
    pub remote_signature_key: Option<[u8; 16]>,
    /// BR/EDR link key derived from the LE LTK
    pub remote_link_key: Option<[u8; 16]>,

    pub local_ltk: Option<[u8; 16]>,
    pub local_ediv: Option<u16>,
    pub local_rand: Option<[u8; 8]>,
    pub local_signature_key: Option<[u8; 16]>,
}

/// Whether `key_size` lies in the range allowed for encryption keys
pub fn is_valid_key_size(key_size: u8) -> bool {
    (SMP_MIN_ENCRYPTION_KEY_SIZE..=SMP_MAX_ENCRYPTION_KEY_SIZE).contains(&key_size)
}

/// Zero the octets of `key` at index `key_size` and above
///
/// The key keeps its 16-octet length.
pub fn mask_key(key: &mut [u8; 16], key_size: u8) {
    let key_size = usize::from(key_size).min(key.len());
    key[key_size..].fill(0);
}
