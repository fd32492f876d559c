//! SMP PDU codec
//!
//! Every PDU starts with its command code octet. Multi-octet fields are
//! little-endian on the wire.

use super::types::*;
use crate::error::PacketError;
use crate::gap::{AddressType, AddressWithType, BdAddr};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

fn read_array<const N: usize>(
    cursor: &mut Cursor<&[u8]>,
    name: &'static str,
) -> Result<[u8; N], PacketError> {
    let mut out = [0u8; N];
    cursor
        .read_exact(&mut out)
        .map_err(|_| PacketError::InvalidLength {
            name,
            expected: N,
            actual: cursor.get_ref().len(),
        })?;
    Ok(out)
}

fn read_u8(cursor: &mut Cursor<&[u8]>, name: &'static str) -> Result<u8, PacketError> {
    cursor.read_u8().map_err(|_| PacketError::InvalidLength {
        name,
        expected: 1,
        actual: 0,
    })
}

impl PairingFeatures {
    /// Wire form of a Pairing Request or Pairing Response, code included
    pub fn to_bytes(&self, code: Code) -> [u8; 7] {
        [
            code.to_u8(),
            self.io_capability.to_u8(),
            self.oob_data_flag.to_u8(),
            self.auth_req.bits(),
            self.maximum_encryption_key_size,
            self.initiator_key_distribution.bits(),
            self.responder_key_distribution.bits(),
        ]
    }

    fn parse_payload(cursor: &mut Cursor<&[u8]>) -> Result<Self, PacketError> {
        let io = read_u8(cursor, "IO capability")?;
        let io_capability = IoCapability::from_u8(io).ok_or(PacketError::InvalidValue {
            field: "IO capability",
            value: io,
        })?;
        let oob = read_u8(cursor, "OOB data flag")?;
        let oob_data_flag = OobDataFlag::from_u8(oob).ok_or(PacketError::InvalidValue {
            field: "OOB data flag",
            value: oob,
        })?;
        Ok(Self {
            io_capability,
            oob_data_flag,
            auth_req: AuthReq::from_bits_retain(read_u8(cursor, "AuthReq")?),
            maximum_encryption_key_size: read_u8(cursor, "maximum encryption key size")?,
            initiator_key_distribution: KeyMask::from_bits_retain(read_u8(
                cursor,
                "initiator key distribution",
            )?),
            responder_key_distribution: KeyMask::from_bits_retain(read_u8(
                cursor,
                "responder key distribution",
            )?),
        })
    }
}

/// Pairing confirm packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingConfirm {
    pub confirm_value: [u8; 16],
}

/// Pairing random packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingRandom {
    pub random_value: [u8; 16],
}

/// Pairing failed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingFailed {
    pub reason: PairingFailedReason,
}

/// Encryption information packet, carrying the distributed LTK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInformation {
    pub long_term_key: [u8; 16],
}

/// Central identification packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralIdentification {
    /// Encrypted Diversifier
    pub ediv: u16,
    /// Random number
    pub rand: [u8; 8],
}

/// Identity information packet, carrying the IRK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityInformation {
    pub identity_resolving_key: [u8; 16],
}

/// Identity address information packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityAddressInformation {
    pub addr_type: AddressType,
    pub bd_addr: BdAddr,
}

impl IdentityAddressInformation {
    pub fn address_with_type(&self) -> AddressWithType {
        AddressWithType::new(self.bd_addr, self.addr_type)
    }
}

/// Signing information packet, carrying the CSRK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningInformation {
    pub signature_key: [u8; 16],
}

/// Security request packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityRequest {
    pub auth_req: AuthReq,
}

/// Pairing public key packet
///
/// Coordinates are kept in wire (little-endian) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingPublicKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

/// Pairing DHKey check packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingDhKeyCheck {
    pub dh_key_check: [u8; 16],
}

/// Keypress notification packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypressNotification {
    pub notification_type: KeypressNotificationType,
}

/// A decoded SMP PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PairingRequest(PairingFeatures),
    PairingResponse(PairingFeatures),
    PairingConfirm(PairingConfirm),
    PairingRandom(PairingRandom),
    PairingFailed(PairingFailed),
    EncryptionInformation(EncryptionInformation),
    CentralIdentification(CentralIdentification),
    IdentityInformation(IdentityInformation),
    IdentityAddressInformation(IdentityAddressInformation),
    SigningInformation(SigningInformation),
    SecurityRequest(SecurityRequest),
    PairingPublicKey(PairingPublicKey),
    PairingDhKeyCheck(PairingDhKeyCheck),
    PairingKeypressNotification(KeypressNotification),
}

impl Command {
    pub fn code(&self) -> Code {
        match self {
            Command::PairingRequest(_) => Code::PairingRequest,
            Command::PairingResponse(_) => Code::PairingResponse,
            Command::PairingConfirm(_) => Code::PairingConfirm,
            Command::PairingRandom(_) => Code::PairingRandom,
            Command::PairingFailed(_) => Code::PairingFailed,
            Command::EncryptionInformation(_) => Code::EncryptionInformation,
            Command::CentralIdentification(_) => Code::CentralIdentification,
            Command::IdentityInformation(_) => Code::IdentityInformation,
            Command::IdentityAddressInformation(_) => Code::IdentityAddressInformation,
            Command::SigningInformation(_) => Code::SigningInformation,
            Command::SecurityRequest(_) => Code::SecurityRequest,
            Command::PairingPublicKey(_) => Code::PairingPublicKey,
            Command::PairingDhKeyCheck(_) => Code::PairingDhKeyCheck,
            Command::PairingKeypressNotification(_) => Code::PairingKeypressNotification,
        }
    }

    pub fn pairing_failed(reason: PairingFailedReason) -> Self {
        Command::PairingFailed(PairingFailed { reason })
    }

    /// Parse a PDU received on the SMP fixed channel
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let (&first, _) = data.split_first().ok_or(PacketError::Empty)?;
        let code = Code::try_from(first)?;
        if data.len() != code.pdu_len() {
            return Err(PacketError::InvalidLength {
                name: "SMP PDU",
                expected: code.pdu_len(),
                actual: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[1..]);
        let cursor = &mut cursor;
        let command = match code {
            Code::PairingRequest => Command::PairingRequest(PairingFeatures::parse_payload(cursor)?),
            Code::PairingResponse => {
                Command::PairingResponse(PairingFeatures::parse_payload(cursor)?)
            }
            Code::PairingConfirm => Command::PairingConfirm(PairingConfirm {
                confirm_value: read_array(cursor, "confirm value")?,
            }),
            Code::PairingRandom => Command::PairingRandom(PairingRandom {
                random_value: read_array(cursor, "random value")?,
            }),
            Code::PairingFailed => {
                let value = read_u8(cursor, "reason")?;
                let reason = PairingFailedReason::from_u8(value).ok_or(PacketError::InvalidValue {
                    field: "pairing failed reason",
                    value,
                })?;
                Command::PairingFailed(PairingFailed { reason })
            }
            Code::EncryptionInformation => Command::EncryptionInformation(EncryptionInformation {
                long_term_key: read_array(cursor, "long term key")?,
            }),
            Code::CentralIdentification => {
                let ediv = cursor
                    .read_u16::<LittleEndian>()
                    .map_err(|_| PacketError::InvalidLength {
                        name: "EDIV",
                        expected: 2,
                        actual: 0,
                    })?;
                Command::CentralIdentification(CentralIdentification {
                    ediv,
                    rand: read_array(cursor, "RAND")?,
                })
            }
            Code::IdentityInformation => Command::IdentityInformation(IdentityInformation {
                identity_resolving_key: read_array(cursor, "identity resolving key")?,
            }),
            Code::IdentityAddressInformation => {
                let addr_type = match read_u8(cursor, "address type")? {
                    0x00 => AddressType::Public,
                    0x01 => AddressType::Random,
                    value => {
                        return Err(PacketError::InvalidValue {
                            field: "identity address type",
                            value,
                        })
                    }
                };
                Command::IdentityAddressInformation(IdentityAddressInformation {
                    addr_type,
                    bd_addr: BdAddr::new(read_array(cursor, "identity address")?),
                })
            }
            Code::SigningInformation => Command::SigningInformation(SigningInformation {
                signature_key: read_array(cursor, "signature key")?,
            }),
            Code::SecurityRequest => Command::SecurityRequest(SecurityRequest {
                auth_req: AuthReq::from_bits_retain(read_u8(cursor, "AuthReq")?),
            }),
            Code::PairingPublicKey => Command::PairingPublicKey(PairingPublicKey {
                x: read_array(cursor, "public key X")?,
                y: read_array(cursor, "public key Y")?,
            }),
            Code::PairingDhKeyCheck => Command::PairingDhKeyCheck(PairingDhKeyCheck {
                dh_key_check: read_array(cursor, "DHKey check")?,
            }),
            Code::PairingKeypressNotification => {
                let value = read_u8(cursor, "notification type")?;
                let notification_type = KeypressNotificationType::from_u8(value).ok_or(
                    PacketError::InvalidValue {
                        field: "keypress notification type",
                        value,
                    },
                )?;
                Command::PairingKeypressNotification(KeypressNotification { notification_type })
            }
        };
        Ok(command)
    }

    /// Serialize to raw packet
    pub fn serialize(&self) -> Vec<u8> {
        let code = self.code();
        let mut packet = Vec::with_capacity(code.pdu_len());
        packet.push(code.to_u8());

        match self {
            Command::PairingRequest(features) | Command::PairingResponse(features) => {
                packet.extend_from_slice(&features.to_bytes(code)[1..]);
            }
            Command::PairingConfirm(pdu) => packet.extend_from_slice(&pdu.confirm_value),
            Command::PairingRandom(pdu) => packet.extend_from_slice(&pdu.random_value),
            Command::PairingFailed(pdu) => packet.push(pdu.reason.to_u8()),
            Command::EncryptionInformation(pdu) => packet.extend_from_slice(&pdu.long_term_key),
            Command::CentralIdentification(pdu) => {
                packet.extend_from_slice(&pdu.ediv.to_le_bytes());
                packet.extend_from_slice(&pdu.rand);
            }
            Command::IdentityInformation(pdu) => {
                packet.extend_from_slice(&pdu.identity_resolving_key)
            }
            Command::IdentityAddressInformation(pdu) => {
                packet.push(pdu.addr_type.as_bit());
                packet.extend_from_slice(&pdu.bd_addr.bytes);
            }
            Command::SigningInformation(pdu) => packet.extend_from_slice(&pdu.signature_key),
            Command::SecurityRequest(pdu) => packet.push(pdu.auth_req.bits()),
            Command::PairingPublicKey(pdu) => {
                packet.extend_from_slice(&pdu.x);
                packet.extend_from_slice(&pdu.y);
            }
            Command::PairingDhKeyCheck(pdu) => packet.extend_from_slice(&pdu.dh_key_check),
            Command::PairingKeypressNotification(pdu) => {
                packet.push(pdu.notification_type.to_u8())
            }
        }

        packet
    }
}
