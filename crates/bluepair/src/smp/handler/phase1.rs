//! Phase 1: pairing feature exchange

use super::{InitialInformations, PairingHandlerLe, Phase1Result};
use crate::gap::Role;
use crate::smp::keys::is_valid_key_size;
use crate::smp::pdu::{Command, SecurityRequest};
use crate::smp::result::PairingFailure;
use crate::smp::types::{Code, PairingFailedReason, PairingFeatures};
use log::{debug, warn};

impl PairingHandlerLe {
    pub(super) async fn exchange_pairing_feature(
        &mut self,
        i: &InitialInformations,
    ) -> Result<Phase1Result, PairingFailure> {
        match i.my_role {
            Role::Central => self.exchange_pairing_feature_as_central(i).await,
            Role::Peripheral => self.exchange_pairing_feature_as_peripheral(i).await,
        }
    }

    async fn exchange_pairing_feature_as_central(
        &mut self,
        i: &InitialInformations,
    ) -> Result<Phase1Result, PairingFailure> {
        let pairing_request = i.my_pairing_capabilities;
        debug!("Sending Pairing Request");
        self.send_l2cap_packet(i, Command::PairingRequest(pairing_request));

        let mut response = self.wait_pairing_response().await;
        if let Err(failure) = &response {
            if failure.received_code == Some(Code::SecurityRequest) {
                // Peer asked for security before our request reached it
                debug!("Security Request crossed our Pairing Request, waiting once more");
                response = self.wait_pairing_response().await;
            }
        }

        let pairing_response = match response {
            Ok(pairing_response) => pairing_response,
            Err(failure) => {
                warn!("Pairing Response did not arrive: {}", failure.message);
                if !failure.is_remote() {
                    self.send_pairing_failed(i, PairingFailedReason::UnspecifiedReason);
                }
                return Err(failure);
            }
        };

        Ok(Phase1Result {
            pairing_request,
            pairing_response,
        })
    }

    async fn exchange_pairing_feature_as_peripheral(
        &mut self,
        i: &InitialInformations,
    ) -> Result<Phase1Result, PairingFailure> {
        let pairing_request = if i.remotely_initiated {
            i.pairing_request.ok_or_else(|| {
                PairingFailure::new("Remotely initiated pairing requires the received Pairing Request")
            })?
        } else {
            debug!("Sending Security Request");
            self.send_l2cap_packet(
                i,
                Command::SecurityRequest(SecurityRequest {
                    auth_req: i.my_pairing_capabilities.auth_req,
                }),
            );
            self.wait_pairing_request().await?
        };

        let maximum_key_size = pairing_request.maximum_encryption_key_size;
        if !is_valid_key_size(maximum_key_size) {
            self.send_pairing_failed(i, PairingFailedReason::EncryptionKeySize);
            return Err(PairingFailure::with_reason(
                format!("Pairing Request key size {} is out of range", maximum_key_size),
                PairingFailedReason::EncryptionKeySize,
            ));
        }

        let pairing_response = pairing_response_for(&i.my_pairing_capabilities, &pairing_request);
        debug!("Sending Pairing Response");
        self.send_l2cap_packet(i, Command::PairingResponse(pairing_response));

        Ok(Phase1Result {
            pairing_request,
            pairing_response,
        })
    }
}

/// Local capabilities, with key distribution limited to what the request asked for
pub(super) fn pairing_response_for(
    capabilities: &PairingFeatures,
    pairing_request: &PairingFeatures,
) -> PairingFeatures {
    PairingFeatures {
        initiator_key_distribution: capabilities.initiator_key_distribution
            & pairing_request.initiator_key_distribution,
        responder_key_distribution: capabilities.responder_key_distribution
            & pairing_request.responder_key_distribution,
        ..*capabilities
    }
}
