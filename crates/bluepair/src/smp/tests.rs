//! Unit tests for the SMP codec and key helpers

use super::*;
use crate::config::PairingConfig;
use crate::error::{PacketError, SmpError};
use crate::gap::{AddressType, AddressWithType, BdAddr, Role};
use crate::hci::{EncryptionChange, EncryptionEnabled, ErrorCode, HciCommand};
use std::sync::Arc;
use tokio::sync::mpsc;

#[test]
fn test_pairing_request_parsing() {
    // KeyboardDisplay, no OOB, Bonding|MITM|SC|CT2, 16, Enc|Id, Enc|Id|Sign
    let data = [0x01, 0x04, 0x00, 0x2D, 0x10, 0x03, 0x07];
    let command = Command::parse(&data).unwrap();

    let features = match command {
        Command::PairingRequest(features) => features,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(features.io_capability, IoCapability::KeyboardDisplay);
    assert_eq!(features.oob_data_flag, OobDataFlag::NotPresent);
    assert!(features.auth_req.contains(AuthReq::BONDING | AuthReq::MITM | AuthReq::SC | AuthReq::CT2));
    assert_eq!(features.maximum_encryption_key_size, 16);
    assert_eq!(features.initiator_key_distribution, KeyMask::ENC_KEY | KeyMask::ID_KEY);
    assert_eq!(
        features.responder_key_distribution,
        KeyMask::ENC_KEY | KeyMask::ID_KEY | KeyMask::SIGN_KEY
    );

    assert_eq!(features.to_bytes(Code::PairingRequest), data);
}

#[test]
fn test_reserved_auth_req_bits_are_retained() {
    // c1 hashes the raw request, so reserved bits must survive a re-encode
    let data = [0x02, 0x03, 0x00, 0xC1, 0x10, 0x00, 0x00];
    let command = Command::parse(&data).unwrap();
    assert_eq!(command.serialize(), data.to_vec());
}

#[test]
fn test_pdu_length_is_exact() {
    assert_eq!(
        Command::parse(&[0x03; 16]),
        Err(PacketError::InvalidLength {
            name: "SMP PDU",
            expected: 17,
            actual: 16
        })
    );
    assert!(Command::parse(&[0x05, 0x08, 0x00]).is_err());
    assert_eq!(Command::parse(&[]), Err(PacketError::Empty));
    assert_eq!(Command::parse(&[0x0F, 0x00]), Err(PacketError::UnknownCode(0x0F)));
}

#[test]
fn test_reserved_values_are_rejected() {
    // IO capability 5 is reserved
    assert!(Command::parse(&[0x01, 0x05, 0x00, 0x01, 0x10, 0x00, 0x00]).is_err());
    // OOB data flag 2 is reserved
    assert!(Command::parse(&[0x01, 0x03, 0x02, 0x01, 0x10, 0x00, 0x00]).is_err());
    // Pairing Failed reason 0 is reserved
    assert!(Command::parse(&[0x05, 0x00]).is_err());
    // Keypress notification type 5 is reserved
    assert!(Command::parse(&[0x0E, 0x05]).is_err());
}

#[test]
fn test_pairing_failed_serialization() {
    let command = Command::pairing_failed(PairingFailedReason::DhKeyCheckFailed);
    assert_eq!(command.code(), Code::PairingFailed);
    assert_eq!(command.serialize(), vec![0x05, 0x0B]);
}

#[test]
fn test_central_identification_fields() {
    let data = [0x07, 0x34, 0x12, 1, 2, 3, 4, 5, 6, 7, 8];
    match Command::parse(&data).unwrap() {
        Command::CentralIdentification(pdu) => {
            assert_eq!(pdu.ediv, 0x1234);
            assert_eq!(pdu.rand, [1, 2, 3, 4, 5, 6, 7, 8]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_identity_address_information() {
    let data = [0x09, 0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0xC6];
    let pdu = match Command::parse(&data).unwrap() {
        Command::IdentityAddressInformation(pdu) => pdu,
        other => panic!("unexpected {:?}", other),
    };
    let address = pdu.address_with_type();
    assert_eq!(address.address_type, AddressType::Random);
    assert_eq!(address.address, BdAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0xC6]));

    // Identity address types go on the wire as a single bit
    let command = Command::IdentityAddressInformation(IdentityAddressInformation {
        addr_type: AddressType::PublicIdentity,
        bd_addr: BdAddr::new([1, 2, 3, 4, 5, 6]),
    });
    assert_eq!(command.serialize(), vec![0x09, 0x00, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_code_display_names() {
    assert_eq!(Code::PairingResponse.to_string(), "PAIRING_RESPONSE");
    assert_eq!(Code::PairingDhKeyCheck.to_string(), "PAIRING_DH_KEY_CHECK");
    assert_eq!(Code::SecurityRequest.to_string(), "SECURITY_REQUEST");
}

#[test]
fn test_key_size_bounds() {
    for key_size in 0..=6 {
        assert!(!is_valid_key_size(key_size));
    }
    for key_size in 7..=16 {
        assert!(is_valid_key_size(key_size));
    }
    for key_size in 17..=255 {
        assert!(!is_valid_key_size(key_size));
    }
}

#[test]
fn test_mask_key() {
    let mut key = [0xFF; 16];
    mask_key(&mut key, 7);
    assert_eq!(&key[..7], &[0xFF; 7]);
    assert_eq!(&key[7..], &[0x00; 9]);

    // Repeating the mask changes nothing
    let masked = key;
    mask_key(&mut key, 7);
    assert_eq!(key, masked);

    let mut full = [0xAB; 16];
    mask_key(&mut full, 16);
    assert_eq!(full, [0xAB; 16]);
}

#[test]
fn test_pairing_failure_origin() {
    let local = PairingFailure::with_reason("confirm", PairingFailedReason::ConfirmValueFailed);
    assert!(!local.is_remote());
    assert_eq!(local.to_string(), "confirm");

    let remote = PairingFailure::with_received_code("failed", Code::PairingFailed);
    assert!(remote.is_remote());
}

struct QueueTransport {
    sent: mpsc::UnboundedSender<Command>,
}

impl PairingTransport for QueueTransport {
    fn send_l2cap_packet(&self, command: Command) {
        let _ = self.sent.send(command);
    }

    fn send_hci_command(&self, _command: HciCommand) {}
}

struct SilentUi;

impl UserInterface for SilentUi {
    fn display_pairing_prompt(&self, _address: &AddressWithType, _name: &str) {}
    fn cancel(&self, _address: &AddressWithType) {}
    fn display_confirm_value(&self, _data: ConfirmationData) {}
    fn display_enter_passkey_dialog(&self, _data: ConfirmationData) {}
    fn display_passkey(&self, _data: ConfirmationData) {}
}

const HANDLE: u16 = 0x0041;

fn peer_address() -> AddressWithType {
    AddressWithType::new(BdAddr::new([0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6]), AddressType::Public)
}

fn manager(role: Role) -> (SecurityManager, PairingResults, mpsc::UnboundedReceiver<Command>) {
    let (sent, received) = mpsc::unbounded_channel();
    let local = LocalDevice {
        capabilities: PairingFeatures::default(),
        identity_address: AddressWithType::new(BdAddr::new([0x5E; 6]), AddressType::Public),
        identity_resolving_key: [0x77; 16],
    };
    let (manager, results) = SecurityManager::new(
        PairingConfig::default(),
        local,
        Arc::new(QueueTransport { sent }),
        Arc::new(SilentUi),
    );
    manager.on_connection_established(LeConnection {
        handle: HANDLE,
        role,
        local_address: AddressWithType::new(BdAddr::new([0x5E; 6]), AddressType::Public),
        remote_address: peer_address(),
        remote_name: "peer".to_string(),
    });
    (manager, results, received)
}

#[tokio::test]
async fn test_manager_rejects_unknown_connection() {
    let (manager, _results, _sent) = manager(Role::Central);

    assert_eq!(manager.create_bond(0x0999), Err(SmpError::UnknownConnection(0x0999)));
    assert_eq!(
        manager.on_l2cap_packet(0x0999, &[0x0B, 0x01]),
        Err(SmpError::UnknownConnection(0x0999))
    );
    let event = EncryptionChange {
        status: ErrorCode::SUCCESS,
        connection_handle: 0x0999,
        encryption_enabled: EncryptionEnabled::On,
    }
    .to_event();
    assert_eq!(manager.on_hci_event(event), Err(SmpError::UnknownConnection(0x0999)));
    assert_eq!(
        manager.cancel_bond(&peer_address()),
        Err(SmpError::NotPairing(peer_address().address))
    );
}

#[tokio::test]
async fn test_manager_allows_one_attempt_per_peer() {
    let (manager, mut results, mut sent) = manager(Role::Central);

    manager.create_bond(HANDLE).unwrap();
    assert!(manager.is_pairing(&peer_address()));
    assert_eq!(
        manager.create_bond(HANDLE),
        Err(SmpError::AlreadyPairing(peer_address().address))
    );
    assert_eq!(sent.recv().await, Some(Command::PairingRequest(PairingFeatures::default())));

    manager.cancel_bond(&peer_address()).unwrap();
    let (address, outcome) = results.recv().await.unwrap();
    assert_eq!(address, peer_address());
    assert!(outcome.is_err());
    assert!(!manager.is_pairing(&peer_address()));
}

#[tokio::test]
async fn test_manager_starts_attempt_on_pairing_request() {
    let (manager, mut results, mut sent) = manager(Role::Peripheral);
    let request = Command::PairingRequest(PairingFeatures::default());

    manager.on_l2cap_packet(HANDLE, &request.serialize()).unwrap();
    assert!(manager.is_pairing(&peer_address()));
    manager
        .on_ui_action(&peer_address(), UiEvent::PairingAccepted(true))
        .unwrap();

    match sent.recv().await {
        Some(Command::PairingResponse(response)) => {
            assert_eq!(response.io_capability, IoCapability::NoInputNoOutput)
        }
        other => panic!("unexpected {:?}", other),
    }

    // Losing the link ends the attempt
    manager.on_disconnection(HANDLE);
    let (address, outcome) = results.recv().await.unwrap();
    assert_eq!(address, peer_address());
    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_manager_drops_unsolicited_pdus() {
    let (manager, _results, _sent) = manager(Role::Central);

    // A Pairing Request only starts an attempt on the peripheral side
    let request = Command::PairingRequest(PairingFeatures::default());
    manager.on_l2cap_packet(HANDLE, &request.serialize()).unwrap();
    manager.on_l2cap_packet(HANDLE, &[0x03; 17]).unwrap();
    assert!(!manager.is_pairing(&peer_address()));

    assert_eq!(
        manager.on_l2cap_packet(HANDLE, &[0x03, 0x00]),
        Err(SmpError::Packet(PacketError::InvalidLength {
            name: "SMP PDU",
            expected: 17,
            actual: 2
        }))
    );
}

#[tokio::test]
async fn test_manager_starts_attempt_on_security_request() {
    let (manager, _results, mut sent) = manager(Role::Central);
    let request = Command::SecurityRequest(SecurityRequest {
        auth_req: AuthReq::BONDING,
    });

    manager.on_l2cap_packet(HANDLE, &request.serialize()).unwrap();
    manager
        .on_ui_action(&peer_address(), UiEvent::PairingAccepted(true))
        .unwrap();
    assert_eq!(sent.recv().await, Some(Command::PairingRequest(PairingFeatures::default())));
}

#[tokio::test]
async fn test_manager_local_oob_data_is_replaced() {
    let (manager, _results, _sent) = manager(Role::Central);
    let first = manager.create_local_oob_data();
    let second = manager.create_local_oob_data();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_manager_forgets_remote_oob_data_on_disconnection() {
    let (manager, _results, _sent) = manager(Role::Central);
    let data = OobData {
        security_manager_tk_value: Some([0x42; 16]),
        le_sc: None,
    };

    manager.set_remote_oob_data(peer_address(), data);
    assert!(manager.has_remote_oob_data(&peer_address()));

    manager.on_disconnection(HANDLE);
    assert!(!manager.has_remote_oob_data(&peer_address()));
    assert!(!manager.is_pairing(&peer_address()));
}
