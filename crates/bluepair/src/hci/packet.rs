//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::error::PacketError;
use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Read};

/// HCI commands issued while pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HciCommand {
    LeStartEncryption {
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    },
    LeLongTermKeyRequestReply {
        handle: u16,
        ltk: [u8; 16],
    },
    LeLongTermKeyRequestNegativeReply {
        handle: u16,
    },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::LeStartEncryption { .. } => (OGF_LE, OCF_LE_START_ENCRYPTION),
            Self::LeLongTermKeyRequestReply { .. } => (OGF_LE, OCF_LE_LONG_TERM_KEY_REQUEST_REPLY),
            Self::LeLongTermKeyRequestNegativeReply { .. } => {
                (OGF_LE, OCF_LE_LONG_TERM_KEY_REQUEST_NEGATIVE_REPLY)
            }
        }
    }

    /// Full 16-bit opcode
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        ((ogf as u16) << 10) | (ocf & 0x3ff)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::LeStartEncryption {
                handle,
                rand,
                ediv,
                ltk,
            } => {
                let mut params = Vec::with_capacity(28);
                params.extend_from_slice(&handle.to_le_bytes());
                params.extend_from_slice(rand);
                params.extend_from_slice(&ediv.to_le_bytes());
                params.extend_from_slice(ltk);
                params
            }

            Self::LeLongTermKeyRequestReply { handle, ltk } => {
                let mut params = Vec::with_capacity(18);
                params.extend_from_slice(&handle.to_le_bytes());
                params.extend_from_slice(ltk);
                params
            }

            Self::LeLongTermKeyRequestNegativeReply { handle } => handle.to_le_bytes().to_vec(),
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Build an event from its code and parameters
    pub fn new(event_code: u8, parameters: Vec<u8>) -> Self {
        Self {
            event_code,
            parameter_total_length: parameters.len() as u8,
            parameters,
        }
    }

    /// Parse an HCI event from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Connection handle carried by the encryption related events
    pub fn connection_handle(&self) -> Option<u16> {
        let offset = match self.event_code {
            EVT_ENCRYPTION_CHANGE | EVT_ENCRYPTION_KEY_REFRESH_COMPLETE => 1,
            EVT_LE_META_EVENT
                if self.parameters.first() == Some(&EVT_LE_LONG_TERM_KEY_REQUEST) =>
            {
                1
            }
            _ => return None,
        };
        let bytes = self.parameters.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]) & 0x0fff)
    }
}

/// HCI status / error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u8);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0x00);
    pub const UNKNOWN_CONNECTION: ErrorCode = ErrorCode(0x02);
    pub const AUTHENTICATION_FAILURE: ErrorCode = ErrorCode(0x05);
    pub const PIN_OR_KEY_MISSING: ErrorCode = ErrorCode(0x06);
    pub const CONNECTION_TIMEOUT: ErrorCode = ErrorCode(0x08);
    pub const INSUFFICIENT_SECURITY: ErrorCode = ErrorCode(0x2F);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "SUCCESS",
            Self::UNKNOWN_CONNECTION => "UNKNOWN_CONNECTION",
            Self::AUTHENTICATION_FAILURE => "AUTHENTICATION_FAILURE",
            Self::PIN_OR_KEY_MISSING => "PIN_OR_KEY_MISSING",
            Self::CONNECTION_TIMEOUT => "CONNECTION_TIMEOUT",
            Self::INSUFFICIENT_SECURITY => "INSUFFICIENT_SECURITY",
            _ => return write!(f, "0x{:02x}", self.0),
        };
        write!(f, "{}", name)
    }
}

/// Encryption_Enabled parameter of the Encryption Change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionEnabled {
    Off,
    /// E0 for BR/EDR, AES-CCM for LE
    On,
    BrEdrAesCcm,
}

impl TryFrom<u8> for EncryptionEnabled {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(EncryptionEnabled::Off),
            0x01 => Ok(EncryptionEnabled::On),
            0x02 => Ok(EncryptionEnabled::BrEdrAesCcm),
            value => Err(PacketError::InvalidValue {
                field: "Encryption_Enabled",
                value,
            }),
        }
    }
}

impl From<EncryptionEnabled> for u8 {
    fn from(value: EncryptionEnabled) -> Self {
        match value {
            EncryptionEnabled::Off => 0x00,
            EncryptionEnabled::On => 0x01,
            EncryptionEnabled::BrEdrAesCcm => 0x02,
        }
    }
}

fn check_event(event: &HciEvent, code: u8, name: &'static str, len: usize) -> Result<(), PacketError> {
    if event.event_code != code {
        return Err(PacketError::UnexpectedEvent(event.event_code));
    }
    if event.parameters.len() < len {
        return Err(PacketError::InvalidLength {
            name,
            expected: len,
            actual: event.parameters.len(),
        });
    }
    Ok(())
}

fn short_read(name: &'static str, expected: usize, actual: usize) -> PacketError {
    PacketError::InvalidLength {
        name,
        expected,
        actual,
    }
}

/// Encryption Change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionChange {
    pub status: ErrorCode,
    pub connection_handle: u16,
    pub encryption_enabled: EncryptionEnabled,
}

impl EncryptionChange {
    const NAME: &'static str = "Encryption Change";
    const LEN: usize = 4;

    pub fn from_event(event: &HciEvent) -> Result<Self, PacketError> {
        check_event(event, EVT_ENCRYPTION_CHANGE, Self::NAME, Self::LEN)?;
        let params = &event.parameters;
        let mut cursor = Cursor::new(&params[1..]);
        let connection_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| short_read(Self::NAME, Self::LEN, params.len()))?;
        Ok(Self {
            status: ErrorCode(params[0]),
            connection_handle: connection_handle & 0x0fff,
            encryption_enabled: EncryptionEnabled::try_from(params[3])?,
        })
    }

    pub fn to_event(&self) -> HciEvent {
        let mut params = vec![self.status.0];
        params.extend_from_slice(&self.connection_handle.to_le_bytes());
        params.push(self.encryption_enabled.into());
        HciEvent::new(EVT_ENCRYPTION_CHANGE, params)
    }
}

/// Encryption Key Refresh Complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionKeyRefreshComplete {
    pub status: ErrorCode,
    pub connection_handle: u16,
}

impl EncryptionKeyRefreshComplete {
    const NAME: &'static str = "Encryption Key Refresh Complete";
    const LEN: usize = 3;

    pub fn from_event(event: &HciEvent) -> Result<Self, PacketError> {
        check_event(event, EVT_ENCRYPTION_KEY_REFRESH_COMPLETE, Self::NAME, Self::LEN)?;
        let params = &event.parameters;
        Ok(Self {
            status: ErrorCode(params[0]),
            connection_handle: u16::from_le_bytes([params[1], params[2]]) & 0x0fff,
        })
    }

    pub fn to_event(&self) -> HciEvent {
        let mut params = vec![self.status.0];
        params.extend_from_slice(&self.connection_handle.to_le_bytes());
        HciEvent::new(EVT_ENCRYPTION_KEY_REFRESH_COMPLETE, params)
    }
}

/// LE Long Term Key Request subevent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeLongTermKeyRequest {
    pub connection_handle: u16,
    pub random_number: [u8; 8],
    pub encrypted_diversifier: u16,
}

impl LeLongTermKeyRequest {
    const NAME: &'static str = "LE Long Term Key Request";
    const LEN: usize = 13;

    pub fn from_event(event: &HciEvent) -> Result<Self, PacketError> {
        check_event(event, EVT_LE_META_EVENT, Self::NAME, Self::LEN)?;
        let params = &event.parameters;
        if params[0] != EVT_LE_LONG_TERM_KEY_REQUEST {
            return Err(PacketError::UnexpectedEvent(params[0]));
        }

        let mut cursor = Cursor::new(&params[1..]);
        let read_error = |_| short_read(Self::NAME, Self::LEN, params.len());
        let connection_handle = cursor.read_u16::<LittleEndian>().map_err(read_error)?;
        let mut random_number = [0u8; 8];
        cursor.read_exact(&mut random_number).map_err(read_error)?;
        let encrypted_diversifier = cursor.read_u16::<LittleEndian>().map_err(read_error)?;

        Ok(Self {
            connection_handle: connection_handle & 0x0fff,
            random_number,
            encrypted_diversifier,
        })
    }

    pub fn to_event(&self) -> HciEvent {
        let mut params = vec![EVT_LE_LONG_TERM_KEY_REQUEST];
        params.extend_from_slice(&self.connection_handle.to_le_bytes());
        params.extend_from_slice(&self.random_number);
        params.extend_from_slice(&self.encrypted_diversifier.to_le_bytes());
        HciEvent::new(EVT_LE_META_EVENT, params)
    }
}
