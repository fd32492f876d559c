//! Suspension points of the pairing handler

use super::{InitialInformations, PairingHandlerLe};
use crate::error::PacketError;
use crate::hci::constants::{EVT_ENCRYPTION_CHANGE, EVT_ENCRYPTION_KEY_REFRESH_COMPLETE};
use crate::hci::{EncryptionChange, EncryptionKeyRefreshComplete, HciEvent, LeLongTermKeyRequest};
use crate::smp::pdu::{
    CentralIdentification, Command, EncryptionInformation, IdentityAddressInformation,
    IdentityInformation, PairingConfirm, PairingDhKeyCheck, PairingPublicKey, PairingRandom,
    SigningInformation,
};
use crate::smp::result::PairingFailure;
use crate::smp::types::{Code, PairingFailedReason, PairingFeatures};
use crate::smp::ui::UiEvent;
use log::{debug, trace, warn};
use tokio::time::{self, Instant};

/// Input delivered to a pairing handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// Raw SMP PDU from the peer
    L2cap(Vec<u8>),
    Hci(HciEvent),
    Ui(UiEvent),
    /// Abort the attempt
    Exit,
}

impl PairingEvent {
    fn kind(&self) -> &'static str {
        match self {
            PairingEvent::L2cap(_) => "L2CAP",
            PairingEvent::Hci(_) => "HCI_EVENT",
            PairingEvent::Ui(_) => "UI",
            PairingEvent::Exit => "EXIT",
        }
    }
}

/// Event that completes Phase 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionChangeResult {
    EncryptionChange(EncryptionChange),
    KeyRefreshComplete(EncryptionKeyRefreshComplete),
}

/// Typed wait for one SMP PDU
macro_rules! wait_command {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub(super) async fn $name(&mut self) -> Result<$ty, PairingFailure> {
            match self.wait_packet(Code::$variant).await? {
                Command::$variant(pdu) => Ok(pdu),
                other => Err(PairingFailure::with_received_code(
                    format!("Was expecting {}, but received {} instead", Code::$variant, other.code()),
                    other.code(),
                )),
            }
        }
    };
}

impl PairingHandlerLe {
    /// Next event for a PDU or HCI wait, deferred events first
    async fn next_event(&mut self, deadline: Instant, what: &str) -> Result<PairingEvent, PairingFailure> {
        if let Some(event) = self.deferred.pop_front() {
            return Ok(event);
        }
        match time::timeout_at(deadline, self.events.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(PairingFailure::new(format!(
                "Event queue closed while waiting for {}",
                what
            ))),
            Err(_) => Err(PairingFailure::new(format!("Timed out waiting for {}", what))),
        }
    }

    /// Wait for the SMP PDU with code `expected`
    ///
    /// Keypress notifications are skipped. A Pairing Failed PDU fails with
    /// the reason the peer sent.
    pub(super) async fn wait_packet(&mut self, expected: Code) -> Result<Command, PairingFailure> {
        let deadline = Instant::now() + self.config.smp_timeout;
        loop {
            let data = match self.next_event(deadline, &format!("L2CAP Packet {}", expected)).await? {
                PairingEvent::L2cap(data) => data,
                other => {
                    return Err(PairingFailure::new(format!(
                        "Was expecting L2CAP Packet {}, but received {} instead",
                        expected,
                        other.kind()
                    )))
                }
            };

            let command = Command::parse(&data).map_err(|error| {
                warn!("Malformed SMP PDU: {}", error);
                let reason = match error {
                    PacketError::UnknownCode(_) => PairingFailedReason::CommandNotSupported,
                    _ => PairingFailedReason::InvalidParameters,
                };
                PairingFailure::with_reason("Malformed L2CAP packet received!", reason)
            })?;

            let received = command.code();
            if received == expected {
                trace!("Received {}", received);
                return Ok(command);
            }

            let message = format!("Was expecting {}, but received {} instead", expected, received);
            match command {
                Command::PairingKeypressNotification(notification) => {
                    debug!("Keypress notification: {:?}", notification.notification_type);
                }
                Command::PairingFailed(failed) => {
                    return Err(PairingFailure {
                        reason: Some(failed.reason),
                        ..PairingFailure::with_received_code(message, received)
                    })
                }
                _ => return Err(PairingFailure::with_received_code(message, received)),
            }
        }
    }

    pub(super) async fn wait_pairing_request(&mut self) -> Result<PairingFeatures, PairingFailure> {
        match self.wait_packet(Code::PairingRequest).await? {
            Command::PairingRequest(features) => Ok(features),
            other => Err(PairingFailure::with_received_code(
                "Was expecting PAIRING_REQUEST",
                other.code(),
            )),
        }
    }

    pub(super) async fn wait_pairing_response(&mut self) -> Result<PairingFeatures, PairingFailure> {
        match self.wait_packet(Code::PairingResponse).await? {
            Command::PairingResponse(features) => Ok(features),
            other => Err(PairingFailure::with_received_code(
                "Was expecting PAIRING_RESPONSE",
                other.code(),
            )),
        }
    }

    wait_command!(wait_pairing_confirm, PairingConfirm, PairingConfirm);
    wait_command!(wait_pairing_random, PairingRandom, PairingRandom);
    wait_command!(wait_pairing_public_key, PairingPublicKey, PairingPublicKey);
    wait_command!(wait_pairing_dh_key_check, PairingDhKeyCheck, PairingDhKeyCheck);
    wait_command!(wait_encryption_information, EncryptionInformation, EncryptionInformation);
    wait_command!(wait_central_identification, CentralIdentification, CentralIdentification);
    wait_command!(wait_identity_information, IdentityInformation, IdentityInformation);
    wait_command!(
        wait_identity_address_information,
        IdentityAddressInformation,
        IdentityAddressInformation
    );
    wait_command!(wait_signing_information, SigningInformation, SigningInformation);

    /// Next HCI event for this connection
    ///
    /// Events carrying another connection handle are ignored.
    async fn wait_hci_event(
        &mut self,
        i: &InitialInformations,
        deadline: Instant,
        what: &str,
    ) -> Result<HciEvent, PairingFailure> {
        loop {
            match self.next_event(deadline, what).await? {
                PairingEvent::Hci(event) => match event.connection_handle() {
                    Some(handle) if handle != i.connection_handle => {
                        debug!("Ignoring HCI event for handle {:#06x}", handle);
                    }
                    _ => return Ok(event),
                },
                other => {
                    return Err(PairingFailure::new(format!(
                        "Was expecting {}, but received {} instead",
                        what,
                        other.kind()
                    )))
                }
            }
        }
    }

    pub(super) async fn wait_encryption_changed(
        &mut self,
        i: &InitialInformations,
    ) -> Result<EncryptionChangeResult, PairingFailure> {
        let deadline = Instant::now() + self.config.smp_timeout;
        let event = self
            .wait_hci_event(i, deadline, "Encryption Change or Key Refresh Complete")
            .await?;
        let malformed = |error: PacketError| PairingFailure::new(format!("Malformed HCI event: {}", error));
        match event.event_code {
            EVT_ENCRYPTION_CHANGE => EncryptionChange::from_event(&event)
                .map(EncryptionChangeResult::EncryptionChange)
                .map_err(malformed),
            EVT_ENCRYPTION_KEY_REFRESH_COMPLETE => EncryptionKeyRefreshComplete::from_event(&event)
                .map(EncryptionChangeResult::KeyRefreshComplete)
                .map_err(malformed),
            _ => Err(PairingFailure::new(
                "Was expecting Encryption Change or Key Refresh Complete but received something else",
            )),
        }
    }

    pub(super) async fn wait_le_long_term_key_request(
        &mut self,
        i: &InitialInformations,
    ) -> Result<LeLongTermKeyRequest, PairingFailure> {
        let deadline = Instant::now() + self.config.smp_timeout;
        let event = self
            .wait_hci_event(i, deadline, "LE Long Term Key Request")
            .await?;
        LeLongTermKeyRequest::from_event(&event).map_err(|error| {
            PairingFailure::new(format!(
                "Was expecting LE Long Term Key Request but received something else: {}",
                error
            ))
        })
    }

    /// Next UI event; `None` on timeout or cancellation
    ///
    /// L2CAP and HCI events arriving meanwhile are kept for the following
    /// waits.
    async fn wait_ui_event(&mut self, what: &str) -> Option<UiEvent> {
        let deadline = Instant::now() + self.config.ui_timeout;
        loop {
            match time::timeout_at(deadline, self.events.recv()).await {
                Ok(Some(PairingEvent::Ui(event))) => return Some(event),
                Ok(Some(PairingEvent::Exit)) | Ok(None) => return None,
                Ok(Some(event)) => {
                    debug!("Deferring {} event received while waiting for {}", event.kind(), what);
                    self.deferred.push_back(event);
                }
                Err(_) => {
                    debug!("Timed out waiting for {}", what);
                    return None;
                }
            }
        }
    }

    pub(super) async fn wait_ui_pairing_accept(&mut self) -> Option<bool> {
        match self.wait_ui_event("pairing accept").await? {
            UiEvent::PairingAccepted(accepted) => Some(accepted),
            other => {
                debug!("Unexpected UI event {:?}", other);
                None
            }
        }
    }

    pub(super) async fn wait_ui_confirm_yes_no(&mut self) -> Option<bool> {
        match self.wait_ui_event("confirm yes/no").await? {
            UiEvent::ConfirmYesNo(confirmed) => Some(confirmed),
            other => {
                debug!("Unexpected UI event {:?}", other);
                None
            }
        }
    }

    pub(super) async fn wait_ui_passkey(&mut self) -> Option<u32> {
        match self.wait_ui_event("passkey").await? {
            UiEvent::Passkey(passkey) => Some(passkey),
            other => {
                debug!("Unexpected UI event {:?}", other);
                None
            }
        }
    }
}
