//! LE legacy pairing: TK selection and STK generation

use super::{i_display_passkey, InitialInformations, PairingHandlerLe, Phase1Result};
use crate::gap::Role;
use crate::smp::crypto::{c1, random_u128, s1};
use crate::smp::pdu::{Command, PairingConfirm, PairingRandom};
use crate::smp::result::PairingFailure;
use crate::smp::types::{
    AuthReq, Code, IoCapability, OobDataFlag, PairingFailedReason, PairingFeatures, PairingMethod,
};
use log::debug;

/// Method used to agree on the TK
pub fn legacy_pairing_method(
    pairing_request: &PairingFeatures,
    pairing_response: &PairingFeatures,
) -> PairingMethod {
    use IoCapability::*;

    if !(pairing_request.auth_req | pairing_response.auth_req).contains(AuthReq::MITM) {
        return PairingMethod::JustWorks;
    }
    if pairing_request.oob_data_flag == OobDataFlag::Present
        && pairing_response.oob_data_flag == OobDataFlag::Present
    {
        return PairingMethod::OutOfBand;
    }
    match (pairing_request.io_capability, pairing_response.io_capability) {
        (NoInputNoOutput, _) | (_, NoInputNoOutput) => PairingMethod::JustWorks,
        (DisplayOnly | DisplayYesNo, DisplayOnly | DisplayYesNo) => PairingMethod::JustWorks,
        _ => PairingMethod::PasskeyEntry,
    }
}

impl PairingHandlerLe {
    /// Returns the STK in wire order
    pub(super) async fn legacy_phase2(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
    ) -> Result<[u8; 16], PairingFailure> {
        let tk = self.do_legacy_stage1(i, phase1).await?;
        let stk = self.do_legacy_stage2(i, phase1, tk).await?;
        Ok(stk.to_le_bytes())
    }

    async fn do_legacy_stage1(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
    ) -> Result<u128, PairingFailure> {
        let method = legacy_pairing_method(&phase1.pairing_request, &phase1.pairing_response);
        debug!("Legacy pairing, method {}", method);

        match method {
            PairingMethod::OutOfBand => {
                let tk = i
                    .remote_oob_data
                    .and_then(|data| data.security_manager_tk_value)
                    .ok_or_else(|| {
                        PairingFailure::with_reason(
                            "OOB TK value is not available",
                            PairingFailedReason::OobNotAvailable,
                        )
                    })?;
                Ok(u128::from_le_bytes(tk))
            }
            PairingMethod::PasskeyEntry => {
                let (mine, remote) = phase1.mine_and_remote(i.my_role);
                let display = i_display_passkey(i.my_role, mine.io_capability, remote.io_capability);
                let passkey = self.obtain_passkey(i, display).await?;
                Ok(u128::from(passkey))
            }
            _ => Ok(0),
        }
    }

    async fn do_legacy_stage2(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        tk: u128,
    ) -> Result<u128, PairingFailure> {
        let preq = phase1.pairing_request.to_bytes(Code::PairingRequest);
        let pres = phase1.pairing_response.to_bytes(Code::PairingResponse);
        let (initiator, responder) = i.central_and_peripheral_addresses();
        let confirm = |rand: u128| {
            c1(
                tk,
                rand,
                &preq,
                &pres,
                initiator.address_type.as_bit(),
                &initiator.address,
                responder.address_type.as_bit(),
                &responder.address,
            )
        };

        match i.my_role {
            Role::Central => {
                let mrand = random_u128();
                let mconfirm = confirm(mrand);
                self.send_l2cap_packet(
                    i,
                    Command::PairingConfirm(PairingConfirm {
                        confirm_value: mconfirm.to_le_bytes(),
                    }),
                );

                let sconfirm = self.wait_pairing_confirm().await?;
                self.send_l2cap_packet(
                    i,
                    Command::PairingRandom(PairingRandom {
                        random_value: mrand.to_le_bytes(),
                    }),
                );

                let srand = u128::from_le_bytes(self.wait_pairing_random().await?.random_value);
                if confirm(srand) != u128::from_le_bytes(sconfirm.confirm_value) {
                    self.send_pairing_failed(i, PairingFailedReason::ConfirmValueFailed);
                    return Err(PairingFailure::with_reason(
                        "sconfirm does not match generated value",
                        PairingFailedReason::ConfirmValueFailed,
                    ));
                }

                Ok(s1(tk, srand, mrand))
            }
            Role::Peripheral => {
                let srand = random_u128();
                let sconfirm = confirm(srand);

                let mconfirm = self.wait_pairing_confirm().await?;
                self.send_l2cap_packet(
                    i,
                    Command::PairingConfirm(PairingConfirm {
                        confirm_value: sconfirm.to_le_bytes(),
                    }),
                );

                let mrand = u128::from_le_bytes(self.wait_pairing_random().await?.random_value);
                if confirm(mrand) != u128::from_le_bytes(mconfirm.confirm_value) {
                    self.send_pairing_failed(i, PairingFailedReason::ConfirmValueFailed);
                    return Err(PairingFailure::with_reason(
                        "mconfirm does not match generated value",
                        PairingFailedReason::ConfirmValueFailed,
                    ));
                }
                self.send_l2cap_packet(
                    i,
                    Command::PairingRandom(PairingRandom {
                        random_value: srand.to_le_bytes(),
                    }),
                );

                Ok(s1(tk, srand, mrand))
            }
        }
    }
}
