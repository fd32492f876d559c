//! Phase 3 key distribution

use super::{InitialInformations, PairingHandlerLe, Phase1Result};
use crate::gap::Role;
use crate::smp::crypto::random_bytes;
use crate::smp::keys::{mask_key, DistributedKeys};
use crate::smp::pdu::{
    CentralIdentification, Command, EncryptionInformation, IdentityAddressInformation,
    IdentityInformation, SigningInformation,
};
use crate::smp::result::PairingFailure;
use crate::smp::types::KeyMask;
use log::debug;

/// Keys this side receives and sends, in that order
///
/// Taken from the Pairing Response, which already limits both masks to
/// what the request asked for. The LTK is derived, not distributed, with
/// Secure Connections.
pub fn key_distribution_masks(role: Role, phase1: &Phase1Result, secure_connections: bool) -> (KeyMask, KeyMask) {
    let response = &phase1.pairing_response;
    let (mut keys_i_receive, mut keys_i_send) = match role {
        Role::Central => (response.responder_key_distribution, response.initiator_key_distribution),
        Role::Peripheral => (response.initiator_key_distribution, response.responder_key_distribution),
    };
    if secure_connections {
        keys_i_receive.remove(KeyMask::ENC_KEY);
        keys_i_send.remove(KeyMask::ENC_KEY);
    }
    (keys_i_receive, keys_i_send)
}

/// Failure for a key that did not arrive, keeping what the peer sent instead
fn missing(what: &str, failure: PairingFailure) -> PairingFailure {
    PairingFailure {
        message: format!("Was expecting {} but did not receive!", what),
        ..failure
    }
}

impl PairingHandlerLe {
    /// The central sends its keys first, then receives the peripheral's
    pub(super) async fn distribute_keys(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        key_size: u8,
        secure_connections: bool,
    ) -> Result<DistributedKeys, PairingFailure> {
        let (keys_i_receive, keys_i_send) = key_distribution_masks(i.my_role, phase1, secure_connections);
        debug!(
            "Distributing keys: sending {:?}, receiving {:?}",
            keys_i_send, keys_i_receive
        );

        let mut keys = DistributedKeys::default();
        match i.my_role {
            Role::Central => {
                self.send_keys(i, keys_i_send, key_size, &mut keys);
                self.receive_keys(keys_i_receive, &mut keys).await?;
            }
            Role::Peripheral => {
                self.receive_keys(keys_i_receive, &mut keys).await?;
                self.send_keys(i, keys_i_send, key_size, &mut keys);
            }
        }
        Ok(keys)
    }

    fn send_keys(&mut self, i: &InitialInformations, keys_i_send: KeyMask, key_size: u8, keys: &mut DistributedKeys) {
        if keys_i_send.contains(KeyMask::ENC_KEY) {
            let mut long_term_key = random_bytes::<16>();
            mask_key(&mut long_term_key, key_size);
            let ediv = u16::from_le_bytes(random_bytes());
            let rand = random_bytes::<8>();

            self.send_l2cap_packet(
                i,
                Command::EncryptionInformation(EncryptionInformation { long_term_key }),
            );
            self.send_l2cap_packet(
                i,
                Command::CentralIdentification(CentralIdentification { ediv, rand }),
            );

            keys.local_ltk = Some(long_term_key);
            keys.local_ediv = Some(ediv);
            keys.local_rand = Some(rand);
        }

        if keys_i_send.contains(KeyMask::ID_KEY) {
            self.send_l2cap_packet(
                i,
                Command::IdentityInformation(IdentityInformation {
                    identity_resolving_key: i.my_identity_resolving_key,
                }),
            );
            self.send_l2cap_packet(
                i,
                Command::IdentityAddressInformation(IdentityAddressInformation {
                    addr_type: i.my_identity_address.address_type,
                    bd_addr: i.my_identity_address.address,
                }),
            );
        }

        if keys_i_send.contains(KeyMask::SIGN_KEY) {
            let signature_key = random_bytes::<16>();
            self.send_l2cap_packet(
                i,
                Command::SigningInformation(SigningInformation { signature_key }),
            );
            keys.local_signature_key = Some(signature_key);
        }
    }

    async fn receive_keys(&mut self, keys_i_receive: KeyMask, keys: &mut DistributedKeys) -> Result<(), PairingFailure> {
        if keys_i_receive.contains(KeyMask::ENC_KEY) {
            let encryption_information = self
                .wait_encryption_information()
                .await
                .map_err(|failure| missing("Encryption Information", failure))?;
            let central_identification = self
                .wait_central_identification()
                .await
                .map_err(|failure| missing("Central Identification", failure))?;

            keys.remote_ltk = Some(encryption_information.long_term_key);
            keys.remote_ediv = Some(central_identification.ediv);
            keys.remote_rand = Some(central_identification.rand);
        }

        if keys_i_receive.contains(KeyMask::ID_KEY) {
            let identity_information = self
                .wait_identity_information()
                .await
                .map_err(|failure| missing("Identity Information", failure))?;
            let identity_address = self
                .wait_identity_address_information()
                .await
                .map_err(|failure| missing("Identity Address Information", failure))?;

            keys.remote_irk = Some(identity_information.identity_resolving_key);
            keys.remote_identity_address = Some(identity_address.address_with_type());
        }

        if keys_i_receive.contains(KeyMask::SIGN_KEY) {
            let signing_information = self
                .wait_signing_information()
                .await
                .map_err(|failure| missing("Signing Identification", failure))?;
            keys.remote_signature_key = Some(signing_information.signature_key);
        }

        Ok(())
    }
}
