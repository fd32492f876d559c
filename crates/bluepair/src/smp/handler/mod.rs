//! LE pairing handler
//!
//! A [`PairingHandlerLe`] drives one pairing attempt, from the feature
//! exchange to key distribution, as a single sequential procedure. It
//! suspends whenever it needs a peer PDU, an HCI event or a user decision;
//! those arrive through the [`PairingHandle`] that feeds its event queue.
//! The terminal callback is consumed by [`PairingHandlerLe::run`], so it
//! fires exactly once.

mod distribution;
mod legacy;
mod phase1;
mod secure_connections;
mod wait;


pub use distribution::key_distribution_masks;
pub use legacy::legacy_pairing_method;
pub use secure_connections::{generate_oob_data, secure_connections_pairing_method, MyOobData};
pub use wait::{EncryptionChangeResult, PairingEvent};

use super::constants::SMP_MAX_ENCRYPTION_KEY_SIZE;
use super::crypto::{self, ltk_to_link_key};
use super::keys::{is_valid_key_size, mask_key};
use super::pdu::Command;
use super::result::{PairingFailure, PairingOutcome, PairingResult};
use super::transport::PairingTransport;
use super::types::{AuthReq, Code, IoCapability, OobData, PairingFailedReason, PairingFeatures};
use super::ui::{ConfirmationData, UiEvent, UserInterface};
use crate::config::PairingConfig;
use crate::gap::{AddressWithType, Role};
use crate::hci::{EncryptionEnabled, HciCommand, HciEvent};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a handler needs to know about one pairing attempt
///
/// Never mutated once the attempt starts.
pub struct InitialInformations {
    pub my_role: Role,
    pub my_connection_address: AddressWithType,
    pub my_identity_address: AddressWithType,
    pub my_identity_resolving_key: [u8; 16],
    pub my_pairing_capabilities: PairingFeatures,
    /// Whether the peer started the pairing
    pub remotely_initiated: bool,
    pub connection_handle: u16,
    pub remote_connection_address: AddressWithType,
    pub remote_name: String,
    /// Pairing Request already received, for a remotely initiated peripheral
    pub pairing_request: Option<PairingFeatures>,
    /// OOB data received from the peer
    pub remote_oob_data: Option<OobData>,
    /// OOB data this device handed to the peer
    pub my_oob_data: Option<MyOobData>,
    pub user_interface: Arc<dyn UserInterface>,
    pub transport: Arc<dyn PairingTransport>,
}

impl fmt::Debug for InitialInformations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialInformations")
            .field("my_role", &self.my_role)
            .field("my_connection_address", &self.my_connection_address)
            .field("remotely_initiated", &self.remotely_initiated)
            .field("connection_handle", &self.connection_handle)
            .field("remote_connection_address", &self.remote_connection_address)
            .field("remote_name", &self.remote_name)
            .finish_non_exhaustive()
    }
}

impl InitialInformations {
    /// Connection address of the central, then of the peripheral
    fn central_and_peripheral_addresses(&self) -> (AddressWithType, AddressWithType) {
        match self.my_role {
            Role::Central => (self.my_connection_address, self.remote_connection_address),
            Role::Peripheral => (self.remote_connection_address, self.my_connection_address),
        }
    }

    fn confirmation_data(&self) -> ConfirmationData {
        ConfirmationData::new(self.remote_connection_address, self.remote_name.clone())
    }
}

/// Negotiated features: the Pairing Request and the Pairing Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase1Result {
    pub pairing_request: PairingFeatures,
    pub pairing_response: PairingFeatures,
}

impl Phase1Result {
    /// Encryption key size both sides support
    pub fn key_size(&self) -> u8 {
        self.pairing_request
            .maximum_encryption_key_size
            .min(self.pairing_response.maximum_encryption_key_size)
    }

    /// Whether both sides requested LE Secure Connections
    pub fn secure_connections(&self) -> bool {
        (self.pairing_request.auth_req & self.pairing_response.auth_req).contains(AuthReq::SC)
    }

    /// (my, remote) features, as seen from `role`
    fn mine_and_remote(&self, role: Role) -> (&PairingFeatures, &PairingFeatures) {
        match role {
            Role::Central => (&self.pairing_request, &self.pairing_response),
            Role::Peripheral => (&self.pairing_response, &self.pairing_request),
        }
    }
}

/// How the CT2 bit was advertised in Phase 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ct2Support {
    Both,
    Neither,
    /// Only one side set CT2. Link key derivation follows the response.
    Asymmetric,
}

/// Compare the CT2 AuthReq bits of the request and the response
pub fn ct2_consistency(pairing_request: &PairingFeatures, pairing_response: &PairingFeatures) -> Ct2Support {
    match (
        pairing_request.auth_req.contains(AuthReq::CT2),
        pairing_response.auth_req.contains(AuthReq::CT2),
    ) {
        (true, true) => Ct2Support::Both,
        (false, false) => Ct2Support::Neither,
        _ => Ct2Support::Asymmetric,
    }
}

/// Passkey Entry: whether this side displays the passkey or types it
pub fn i_display_passkey(role: Role, mine: IoCapability, remote: IoCapability) -> bool {
    use IoCapability::*;

    match (mine, remote) {
        (DisplayOnly | DisplayYesNo, _) => true,
        (KeyboardDisplay, KeyboardDisplay) => role == Role::Central,
        (KeyboardDisplay, KeyboardOnly) => true,
        _ => false,
    }
}

/// Sender side of a handler's event queue
#[derive(Debug, Clone)]
pub struct PairingHandle {
    sender: mpsc::UnboundedSender<PairingEvent>,
}

impl PairingHandle {
    /// Deliver an SMP PDU received from the peer
    pub fn on_l2cap_packet(&self, data: &[u8]) {
        self.post(PairingEvent::L2cap(data.to_vec()));
    }

    /// Deliver an already decoded SMP PDU
    pub fn on_command(&self, command: &Command) {
        self.post(PairingEvent::L2cap(command.serialize()));
    }

    pub fn on_hci_event(&self, event: HciEvent) {
        self.post(PairingEvent::Hci(event));
    }

    pub fn on_ui_action(&self, event: UiEvent) {
        self.post(PairingEvent::Ui(event));
    }

    /// Abort the attempt; the pending wait fails
    pub fn cancel(&self) {
        self.post(PairingEvent::Exit);
    }

    /// Whether the handler has finished
    pub fn is_finished(&self) -> bool {
        self.sender.is_closed()
    }

    fn post(&self, event: PairingEvent) {
        if self.sender.send(event).is_err() {
            debug!("Pairing handler already finished, dropping event");
        }
    }
}

/// LE pairing state machine for one attempt
pub struct PairingHandlerLe {
    config: PairingConfig,
    events: mpsc::UnboundedReceiver<PairingEvent>,
    /// L2CAP and HCI events that arrived during a user interface wait
    deferred: VecDeque<PairingEvent>,
    sent_pdu: bool,
    sent_pairing_failed: bool,
    ui_shown: bool,
}

impl PairingHandlerLe {
    pub fn new(config: PairingConfig) -> (Self, PairingHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let handler = Self {
            config,
            events,
            deferred: VecDeque::new(),
            sent_pdu: false,
            sent_pairing_failed: false,
            ui_shown: false,
        };
        (handler, PairingHandle { sender })
    }

    /// Run the attempt on its own tokio task
    pub fn spawn<F>(i: InitialInformations, config: PairingConfig, on_pairing_finished: F) -> PairingHandle
    where
        F: FnOnce(PairingOutcome) + Send + 'static,
    {
        let (handler, handle) = Self::new(config);
        tokio::spawn(handler.run(i, on_pairing_finished));
        handle
    }

    /// Drive the attempt to completion and report its outcome
    pub async fn run<F>(mut self, i: InitialInformations, on_pairing_finished: F)
    where
        F: FnOnce(PairingOutcome) + Send + 'static,
    {
        let outcome = self.pairing_main(&i).await;
        match &outcome {
            Ok(result) => info!(
                "Pairing with {} finished, key size {}",
                i.remote_connection_address, result.key_size
            ),
            Err(failure) => {
                warn!(
                    "Pairing with {} failed: {}",
                    i.remote_connection_address, failure.message
                );
                self.clean_up_after_failure(&i, failure);
            }
        }
        on_pairing_finished(outcome);
    }

    async fn pairing_main(&mut self, i: &InitialInformations) -> PairingOutcome {
        debug!(
            "Pairing as {} with {} started{}",
            i.my_role,
            i.remote_connection_address,
            if i.remotely_initiated { " by the peer" } else { "" }
        );

        if i.remotely_initiated {
            self.ui_shown = true;
            i.user_interface
                .display_pairing_prompt(&i.remote_connection_address, &i.remote_name);
            if self.wait_ui_pairing_accept().await != Some(true) {
                return Err(PairingFailure::new(
                    "User either did not accept the remote pairing, or the prompt timed out",
                ));
            }
            debug!("User accepted the remote pairing");
        }

        let phase1 = self.exchange_pairing_feature(i).await?;

        let key_size = phase1.key_size();
        if !is_valid_key_size(key_size) {
            self.send_pairing_failed(i, PairingFailedReason::EncryptionKeySize);
            return Err(PairingFailure::with_reason(
                format!("Key size {} is out of range", key_size),
                PairingFailedReason::EncryptionKeySize,
            ));
        }
        if key_size != SMP_MAX_ENCRYPTION_KEY_SIZE {
            warn!("Resulting key size is below maximum: {}", key_size);
        }

        let secure_connections = phase1.secure_connections();
        let mut key = if secure_connections {
            self.secure_connections_phase2(i, &phase1).await?
        } else {
            self.legacy_phase2(i, &phase1).await?
        };
        mask_key(&mut key, key_size);

        match i.my_role {
            Role::Central => {
                self.send_hci_le_start_encryption(i, i.connection_handle, [0; 8], 0, key)
            }
            Role::Peripheral => {
                let request = self.wait_le_long_term_key_request(i).await?;
                trace!(
                    "LTK requested, ediv {:#06x} rand {}",
                    request.encrypted_diversifier,
                    hex::encode(request.random_number)
                );
                self.send_hci_le_long_term_key_reply(i, i.connection_handle, key);
            }
        }

        self.confirm_encryption(i).await?;

        let mut distributed_keys = self
            .distribute_keys(i, &phase1, key_size, secure_connections)
            .await?;

        if secure_connections {
            // EncKey was not distributed; both sides hold the derived LTK
            distributed_keys.local_ltk = Some(key);
            distributed_keys.remote_ltk = Some(key);

            let response = &phase1.pairing_response;
            if ct2_consistency(&phase1.pairing_request, response) == Ct2Support::Asymmetric {
                warn!("CT2 advertised by only one side, deriving the link key from the Pairing Response");
            }
            let use_h7 = response.auth_req.contains(AuthReq::CT2);
            let link_key = ltk_to_link_key(u128::from_le_bytes(key), use_h7);
            distributed_keys.remote_link_key = Some(link_key.to_le_bytes());
        }

        Ok(PairingResult {
            connection_address: i.remote_connection_address,
            distributed_keys,
            key_size,
            secure_connections,
        })
    }

    /// Phase 3: the link must now be encrypted with the new key
    async fn confirm_encryption(&mut self, i: &InitialInformations) -> Result<(), PairingFailure> {
        match self.wait_encryption_changed(i).await? {
            EncryptionChangeResult::EncryptionChange(change) => {
                if !change.status.is_success()
                    || change.encryption_enabled != EncryptionEnabled::On
                {
                    return Err(PairingFailure::new(format!(
                        "Encryption change failed: status {}, enabled {:?}",
                        change.status, change.encryption_enabled
                    )));
                }
            }
            EncryptionChangeResult::KeyRefreshComplete(refresh) => {
                if !refresh.status.is_success() {
                    return Err(PairingFailure::new(format!(
                        "Encryption key refresh failed: status {}",
                        refresh.status
                    )));
                }
            }
        }
        debug!("Link to {} encrypted", i.remote_connection_address);
        Ok(())
    }

    fn clean_up_after_failure(&mut self, i: &InitialInformations, failure: &PairingFailure) {
        // No reply to the peer's own Pairing Failed
        if self.sent_pdu && !self.sent_pairing_failed && !failure.is_remote() {
            let reason = failure.reason.unwrap_or(PairingFailedReason::UnspecifiedReason);
            self.send_pairing_failed(i, reason);
        }
        if self.ui_shown {
            i.user_interface.cancel(&i.remote_connection_address);
        }
    }

    fn send_l2cap_packet(&mut self, i: &InitialInformations, command: Command) {
        trace!("Sending {} to {}", command.code(), i.remote_connection_address);
        if command.code() == Code::PairingFailed {
            self.sent_pairing_failed = true;
        }
        self.sent_pdu = true;
        i.transport.send_l2cap_packet(command);
    }

    fn send_pairing_failed(&mut self, i: &InitialInformations, reason: PairingFailedReason) {
        self.send_l2cap_packet(i, Command::pairing_failed(reason));
    }

    fn send_hci_le_start_encryption(
        &self,
        i: &InitialInformations,
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    ) {
        trace!("Starting encryption on handle {:#06x}", handle);
        i.transport.send_hci_command(HciCommand::LeStartEncryption {
            handle,
            rand,
            ediv,
            ltk,
        });
    }

    fn send_hci_le_long_term_key_reply(&self, i: &InitialInformations, handle: u16, ltk: [u8; 16]) {
        trace!("Replying with LTK on handle {:#06x}", handle);
        i.transport
            .send_hci_command(HciCommand::LeLongTermKeyRequestReply { handle, ltk });
    }

    /// Passkey Entry: display a fresh passkey or ask the user for one
    async fn obtain_passkey(&mut self, i: &InitialInformations, display: bool) -> Result<u32, PairingFailure> {
        self.ui_shown = true;
        if display {
            let passkey = crypto::generate_passkey();
            debug!("Displaying passkey");
            i.user_interface
                .display_passkey(i.confirmation_data().with_numeric_value(passkey));
            return Ok(passkey);
        }

        i.user_interface
            .display_enter_passkey_dialog(i.confirmation_data());
        self.wait_ui_passkey().await.ok_or_else(|| {
            PairingFailure::with_reason(
                "Passkey did not arrive!",
                PairingFailedReason::PasskeyEntryFailed,
            )
        })
    }
}
