//! LE Secure Connections: public key exchange, authentication and LTK
//! generation

use super::{i_display_passkey, InitialInformations, PairingHandlerLe, Phase1Result};
use crate::gap::Role;
use crate::smp::constants::SMP_PASSKEY_ROUNDS;
use crate::smp::crypto::{f4, f5, f6, g2, random_u128, EcdhKeyPair, PublicKey};
use crate::smp::pdu::{Command, PairingConfirm, PairingDhKeyCheck, PairingRandom};
use crate::smp::result::PairingFailure;
use crate::smp::types::{
    AuthReq, IoCapability, OobDataFlag, PairingFailedReason, PairingFeatures, PairingMethod,
};
use log::debug;

/// OOB data this device hands to the peer out of band
///
/// The key pair is reused for the public key exchange when the peer
/// reports having this data.
#[derive(Debug, Clone)]
pub struct MyOobData {
    pub key_pair: EcdhKeyPair,
    /// Random value r, wire order
    pub r: [u8; 16],
    /// Confirmation value `f4(PKx, PKx, r, 0)`, wire order
    pub c: [u8; 16],
}

/// Generate a key pair with its OOB random and confirmation values
pub fn generate_oob_data() -> MyOobData {
    let key_pair = EcdhKeyPair::generate();
    let r = random_u128();
    let x = key_pair.public_key().x;
    let c = f4(&x, &x, r, 0);
    MyOobData {
        key_pair,
        r: r.to_le_bytes(),
        c: c.to_le_bytes(),
    }
}

/// Method used to authenticate the public keys
pub fn secure_connections_pairing_method(
    pairing_request: &PairingFeatures,
    pairing_response: &PairingFeatures,
) -> PairingMethod {
    use IoCapability::*;

    if !(pairing_request.auth_req | pairing_response.auth_req).contains(AuthReq::MITM) {
        return PairingMethod::JustWorks;
    }
    if pairing_request.oob_data_flag == OobDataFlag::Present
        || pairing_response.oob_data_flag == OobDataFlag::Present
    {
        return PairingMethod::OutOfBand;
    }
    match (pairing_request.io_capability, pairing_response.io_capability) {
        (DisplayYesNo | KeyboardDisplay, DisplayYesNo | KeyboardDisplay) => {
            PairingMethod::NumericComparison
        }
        (NoInputNoOutput, _) | (_, NoInputNoOutput) => PairingMethod::JustWorks,
        (DisplayOnly | DisplayYesNo, DisplayOnly | DisplayYesNo) => PairingMethod::JustWorks,
        _ => PairingMethod::PasskeyEntry,
    }
}

/// Public keys, central's first, and the shared DHKey
struct KeyExchange {
    pka: PublicKey,
    pkb: PublicKey,
    dh_key: [u8; 32],
}

/// Nonces and passkey/OOB values that feed f6
#[derive(Clone, Copy)]
struct Stage1Result {
    na: u128,
    nb: u128,
    ra: u128,
    rb: u128,
}

impl PairingHandlerLe {
    /// Returns the LTK in wire order
    pub(super) async fn secure_connections_phase2(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
    ) -> Result<[u8; 16], PairingFailure> {
        let (_, remote) = phase1.mine_and_remote(i.my_role);
        let remote_has_my_oob_data = remote.oob_data_flag == OobDataFlag::Present;

        let key_exchange = self.exchange_public_keys(i, remote_has_my_oob_data).await?;
        let stage1 = self
            .do_secure_connections_stage1(i, phase1, &key_exchange)
            .await?;
        let ltk = self
            .do_secure_connections_stage2(i, phase1, &key_exchange, &stage1)
            .await?;
        Ok(ltk.to_le_bytes())
    }

    async fn exchange_public_keys(
        &mut self,
        i: &InitialInformations,
        remote_has_my_oob_data: bool,
    ) -> Result<KeyExchange, PairingFailure> {
        let key_pair = match (&i.my_oob_data, remote_has_my_oob_data) {
            (Some(my_oob_data), true) => my_oob_data.key_pair.clone(),
            (None, true) => {
                self.send_pairing_failed(i, PairingFailedReason::OobNotAvailable);
                return Err(PairingFailure::with_reason(
                    "Peer has OOB data from us, but none was generated",
                    PairingFailedReason::OobNotAvailable,
                ));
            }
            (_, false) => EcdhKeyPair::generate(),
        };
        let local = *key_pair.public_key();

        let remote = match i.my_role {
            Role::Central => {
                self.send_l2cap_packet(i, Command::PairingPublicKey(local.to_pdu()));
                PublicKey::from_pdu(&self.wait_pairing_public_key().await?)
            }
            Role::Peripheral => PublicKey::from_pdu(&self.wait_pairing_public_key().await?),
        };

        let dh_key = match key_pair.dh_key(&remote) {
            Some(dh_key) => dh_key,
            None => {
                self.send_pairing_failed(i, PairingFailedReason::DhKeyCheckFailed);
                return Err(PairingFailure::with_reason(
                    "Remote public key is not valid!",
                    PairingFailedReason::DhKeyCheckFailed,
                ));
            }
        };

        if i.my_role == Role::Peripheral {
            self.send_l2cap_packet(i, Command::PairingPublicKey(local.to_pdu()));
        }

        let (pka, pkb) = match i.my_role {
            Role::Central => (local, remote),
            Role::Peripheral => (remote, local),
        };
        Ok(KeyExchange { pka, pkb, dh_key })
    }

    async fn do_secure_connections_stage1(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        kx: &KeyExchange,
    ) -> Result<Stage1Result, PairingFailure> {
        let method = secure_connections_pairing_method(&phase1.pairing_request, &phase1.pairing_response);
        debug!("Secure Connections pairing, method {}", method);

        match method {
            PairingMethod::JustWorks => self.do_just_works_or_numeric_comparison(i, kx, false).await,
            PairingMethod::NumericComparison => {
                self.do_just_works_or_numeric_comparison(i, kx, true).await
            }
            PairingMethod::PasskeyEntry => self.do_passkey_entry(i, phase1, kx).await,
            PairingMethod::OutOfBand => self.do_out_of_band(i, phase1, kx).await,
        }
    }

    fn send_random(&mut self, i: &InitialInformations, value: u128) {
        self.send_l2cap_packet(
            i,
            Command::PairingRandom(PairingRandom {
                random_value: value.to_le_bytes(),
            }),
        );
    }

    fn send_confirm(&mut self, i: &InitialInformations, value: u128) {
        self.send_l2cap_packet(
            i,
            Command::PairingConfirm(PairingConfirm {
                confirm_value: value.to_le_bytes(),
            }),
        );
    }

    async fn receive_random(&mut self) -> Result<u128, PairingFailure> {
        Ok(u128::from_le_bytes(self.wait_pairing_random().await?.random_value))
    }

    async fn receive_confirm(&mut self) -> Result<u128, PairingFailure> {
        Ok(u128::from_le_bytes(self.wait_pairing_confirm().await?.confirm_value))
    }

    fn confirm_value_failed(&mut self, i: &InitialInformations, message: &str) -> PairingFailure {
        self.send_pairing_failed(i, PairingFailedReason::ConfirmValueFailed);
        PairingFailure::with_reason(message, PairingFailedReason::ConfirmValueFailed)
    }

    async fn do_just_works_or_numeric_comparison(
        &mut self,
        i: &InitialInformations,
        kx: &KeyExchange,
        numeric_comparison: bool,
    ) -> Result<Stage1Result, PairingFailure> {
        let (na, nb) = match i.my_role {
            Role::Central => {
                let na = random_u128();
                let cb = self.receive_confirm().await?;
                self.send_random(i, na);
                let nb = self.receive_random().await?;
                if f4(&kx.pkb.x, &kx.pka.x, nb, 0) != cb {
                    return Err(self.confirm_value_failed(i, "Cb != Cb_local"));
                }
                (na, nb)
            }
            Role::Peripheral => {
                let nb = random_u128();
                self.send_confirm(i, f4(&kx.pkb.x, &kx.pka.x, nb, 0));
                let na = self.receive_random().await?;
                self.send_random(i, nb);
                (na, nb)
            }
        };

        if numeric_comparison {
            let value = g2(&kx.pka.x, &kx.pkb.x, na, nb);
            self.ui_shown = true;
            i.user_interface
                .display_confirm_value(i.confirmation_data().with_numeric_value(value));
            if self.wait_ui_confirm_yes_no().await != Some(true) {
                self.send_pairing_failed(i, PairingFailedReason::NumericComparisonFailed);
                return Err(PairingFailure::with_reason(
                    "Numeric comparison was not confirmed",
                    PairingFailedReason::NumericComparisonFailed,
                ));
            }
        }

        Ok(Stage1Result { na, nb, ra: 0, rb: 0 })
    }

    async fn do_passkey_entry(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        kx: &KeyExchange,
    ) -> Result<Stage1Result, PairingFailure> {
        let (mine, remote) = phase1.mine_and_remote(i.my_role);
        let display = i_display_passkey(i.my_role, mine.io_capability, remote.io_capability);
        let passkey = self.obtain_passkey(i, display).await?;

        let mut na = 0;
        let mut nb = 0;
        for round in 0..SMP_PASSKEY_ROUNDS {
            let ri = 0x80 | ((passkey >> round) & 1) as u8;
            match i.my_role {
                Role::Central => {
                    let nai = random_u128();
                    self.send_confirm(i, f4(&kx.pka.x, &kx.pkb.x, nai, ri));
                    let cbi = self.receive_confirm().await?;
                    self.send_random(i, nai);
                    let nbi = self.receive_random().await?;
                    if f4(&kx.pkb.x, &kx.pka.x, nbi, ri) != cbi {
                        return Err(self.confirm_value_failed(i, "Cbi != Cbi_local"));
                    }
                    na = nai;
                    nb = nbi;
                }
                Role::Peripheral => {
                    let nbi = random_u128();
                    let cai = self.receive_confirm().await?;
                    self.send_confirm(i, f4(&kx.pkb.x, &kx.pka.x, nbi, ri));
                    let nai = self.receive_random().await?;
                    if f4(&kx.pka.x, &kx.pkb.x, nai, ri) != cai {
                        return Err(self.confirm_value_failed(i, "Cai != Cai_local"));
                    }
                    self.send_random(i, nbi);
                    na = nai;
                    nb = nbi;
                }
            }
        }

        let r = u128::from(passkey);
        Ok(Stage1Result { na, nb, ra: r, rb: r })
    }

    async fn do_out_of_band(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        kx: &KeyExchange,
    ) -> Result<Stage1Result, PairingFailure> {
        let (mine, remote) = phase1.mine_and_remote(i.my_role);
        let remote_key = match i.my_role {
            Role::Central => &kx.pkb,
            Role::Peripheral => &kx.pka,
        };

        let local_r = match (&i.my_oob_data, remote.oob_data_flag) {
            (Some(my_oob_data), OobDataFlag::Present) => u128::from_le_bytes(my_oob_data.r),
            _ => 0,
        };

        let remote_r = if mine.oob_data_flag == OobDataFlag::Present {
            let data = i
                .remote_oob_data
                .and_then(|data| data.le_sc)
                .ok_or_else(|| {
                    PairingFailure::with_reason(
                        "Secure Connections OOB data is not available",
                        PairingFailedReason::OobNotAvailable,
                    )
                })?;
            let r = u128::from_le_bytes(data.r);
            if f4(&remote_key.x, &remote_key.x, r, 0) != u128::from_le_bytes(data.c) {
                return Err(self.confirm_value_failed(i, "Remote OOB confirmation does not match"));
            }
            r
        } else {
            0
        };

        let (ra, rb) = match i.my_role {
            Role::Central => (local_r, remote_r),
            Role::Peripheral => (remote_r, local_r),
        };

        let (na, nb) = match i.my_role {
            Role::Central => {
                let na = random_u128();
                self.send_random(i, na);
                (na, self.receive_random().await?)
            }
            Role::Peripheral => {
                let na = self.receive_random().await?;
                let nb = random_u128();
                self.send_random(i, nb);
                (na, nb)
            }
        };

        Ok(Stage1Result { na, nb, ra, rb })
    }

    async fn do_secure_connections_stage2(
        &mut self,
        i: &InitialInformations,
        phase1: &Phase1Result,
        kx: &KeyExchange,
        stage1: &Stage1Result,
    ) -> Result<u128, PairingFailure> {
        let (central, peripheral) = i.central_and_peripheral_addresses();
        let a = central.to_pairing_address();
        let b = peripheral.to_pairing_address();
        let Stage1Result { na, nb, ra, rb } = *stage1;

        let (mac_key, ltk) = f5(&kx.dh_key, na, nb, &a, &b);
        let ea = f6(mac_key, na, nb, rb, &io_cap(&phase1.pairing_request), &a, &b);
        let eb = f6(mac_key, nb, na, ra, &io_cap(&phase1.pairing_response), &b, &a);

        match i.my_role {
            Role::Central => {
                self.send_l2cap_packet(
                    i,
                    Command::PairingDhKeyCheck(PairingDhKeyCheck {
                        dh_key_check: ea.to_le_bytes(),
                    }),
                );
                let check = self.wait_pairing_dh_key_check().await?;
                if u128::from_le_bytes(check.dh_key_check) != eb {
                    self.send_pairing_failed(i, PairingFailedReason::DhKeyCheckFailed);
                    return Err(PairingFailure::with_reason(
                        "Eb != Eb_local",
                        PairingFailedReason::DhKeyCheckFailed,
                    ));
                }
            }
            Role::Peripheral => {
                let check = self.wait_pairing_dh_key_check().await?;
                if u128::from_le_bytes(check.dh_key_check) != ea {
                    self.send_pairing_failed(i, PairingFailedReason::DhKeyCheckFailed);
                    return Err(PairingFailure::with_reason(
                        "Ea != Ea_local",
                        PairingFailedReason::DhKeyCheckFailed,
                    ));
                }
                self.send_l2cap_packet(
                    i,
                    Command::PairingDhKeyCheck(PairingDhKeyCheck {
                        dh_key_check: eb.to_le_bytes(),
                    }),
                );
            }
        }

        Ok(ltk)
    }
}

/// IOcap input of f6: AuthReq, OOB data flag, IO capability
fn io_cap(features: &PairingFeatures) -> [u8; 3] {
    [
        features.auth_req.bits(),
        features.oob_data_flag.to_u8(),
        features.io_capability.to_u8(),
    ]
}
