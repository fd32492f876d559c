//! Unit tests for HCI packet parsing and serialization

use super::constants::*;
use super::packet::*;
use crate::error::PacketError;

#[test]
fn test_le_start_encryption_serialization() {
    let command = HciCommand::LeStartEncryption {
        handle: 0x0040,
        rand: [0; 8],
        ediv: 0,
        ltk: [0xAA; 16],
    };
    let packet = command.to_packet();

    assert_eq!(packet[0], HCI_COMMAND_PKT);

    // Opcode: LE Start Encryption (0x2019)
    let opcode = u16::from_le_bytes([packet[1], packet[2]]);
    assert_eq!(opcode, 0x2019);

    // Param length: handle(2) + rand(8) + ediv(2) + ltk(16)
    assert_eq!(packet[3], 28);
    assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 0x0040);
    assert_eq!(&packet[6..14], &[0u8; 8]);
    assert_eq!(u16::from_le_bytes([packet[14], packet[15]]), 0);
    assert_eq!(&packet[16..32], &[0xAA; 16]);
}

#[test]
fn test_long_term_key_reply_serialization() {
    let command = HciCommand::LeLongTermKeyRequestReply {
        handle: 0x0001,
        ltk: [0x11; 16],
    };
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x201A);
    assert_eq!(packet[3], 18);
    assert_eq!(&packet[6..22], &[0x11; 16]);

    let negative = HciCommand::LeLongTermKeyRequestNegativeReply { handle: 0x0001 };
    assert_eq!(negative.opcode(), 0x201B);
    assert_eq!(negative.to_packet(), vec![HCI_COMMAND_PKT, 0x1B, 0x20, 2, 0x01, 0x00]);
}

#[test]
fn test_hci_event_parsing() {
    // Encryption Change: status=0, handle=0x0040, enabled=1
    let data = [EVT_ENCRYPTION_CHANGE, 4, 0x00, 0x40, 0x00, 0x01];
    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.event_code, EVT_ENCRYPTION_CHANGE);
    assert_eq!(event.parameter_total_length, 4);
    assert_eq!(event.connection_handle(), Some(0x0040));

    let change = EncryptionChange::from_event(&event).unwrap();
    assert!(change.status.is_success());
    assert_eq!(change.connection_handle, 0x0040);
    assert_eq!(change.encryption_enabled, EncryptionEnabled::On);

    // Truncated buffer
    assert!(HciEvent::parse(&[EVT_ENCRYPTION_CHANGE, 4, 0x00]).is_none());
}

#[test]
fn test_encryption_change_rejects_other_events() {
    let refresh = EncryptionKeyRefreshComplete {
        status: ErrorCode::SUCCESS,
        connection_handle: 7,
    }
    .to_event();

    assert_eq!(
        EncryptionChange::from_event(&refresh),
        Err(PacketError::UnexpectedEvent(EVT_ENCRYPTION_KEY_REFRESH_COMPLETE))
    );
    assert_eq!(
        EncryptionKeyRefreshComplete::from_event(&refresh).unwrap().connection_handle,
        7
    );

    let short = HciEvent::new(EVT_ENCRYPTION_CHANGE, vec![0x00, 0x01]);
    assert!(matches!(
        EncryptionChange::from_event(&short),
        Err(PacketError::InvalidLength { .. })
    ));

    let bad_enabled = HciEvent::new(EVT_ENCRYPTION_CHANGE, vec![0x00, 0x01, 0x00, 0x07]);
    assert!(matches!(
        EncryptionChange::from_event(&bad_enabled),
        Err(PacketError::InvalidValue { value: 0x07, .. })
    ));
}

#[test]
fn test_long_term_key_request_parsing() {
    let request = LeLongTermKeyRequest {
        connection_handle: 0x0123,
        random_number: [1, 2, 3, 4, 5, 6, 7, 8],
        encrypted_diversifier: 0xBEEF,
    };
    let event = request.to_event();

    assert_eq!(event.event_code, EVT_LE_META_EVENT);
    assert_eq!(event.parameters[0], EVT_LE_LONG_TERM_KEY_REQUEST);
    assert_eq!(event.connection_handle(), Some(0x0123));
    assert_eq!(LeLongTermKeyRequest::from_event(&event).unwrap(), request);

    // Another LE meta subevent is not an LTK request
    let mut other = event.clone();
    other.parameters[0] = 0x01;
    assert_eq!(
        LeLongTermKeyRequest::from_event(&other),
        Err(PacketError::UnexpectedEvent(0x01))
    );
    assert_eq!(other.connection_handle(), None);
}

#[test]
fn test_error_code_display() {
    assert_eq!(ErrorCode::SUCCESS.to_string(), "SUCCESS");
    assert_eq!(ErrorCode::PIN_OR_KEY_MISSING.to_string(), "PIN_OR_KEY_MISSING");
    assert_eq!(ErrorCode(0x3E).to_string(), "0x3e");
}
