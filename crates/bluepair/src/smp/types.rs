//! Type definitions for the Security Manager Protocol
use super::constants::*;
use crate::error::PacketError;
use bitflags::bitflags;
use std::fmt;

/// SMP command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    PairingRequest,
    PairingResponse,
    PairingConfirm,
    PairingRandom,
    PairingFailed,
    EncryptionInformation,
    CentralIdentification,
    IdentityInformation,
    IdentityAddressInformation,
    SigningInformation,
    SecurityRequest,
    PairingPublicKey,
    PairingDhKeyCheck,
    PairingKeypressNotification,
}

impl Code {
    pub fn to_u8(&self) -> u8 {
        match self {
            Code::PairingRequest => SMP_PAIRING_REQUEST,
            Code::PairingResponse => SMP_PAIRING_RESPONSE,
            Code::PairingConfirm => SMP_PAIRING_CONFIRM,
            Code::PairingRandom => SMP_PAIRING_RANDOM,
            Code::PairingFailed => SMP_PAIRING_FAILED,
            Code::EncryptionInformation => SMP_ENCRYPTION_INFORMATION,
            Code::CentralIdentification => SMP_CENTRAL_IDENTIFICATION,
            Code::IdentityInformation => SMP_IDENTITY_INFORMATION,
            Code::IdentityAddressInformation => SMP_IDENTITY_ADDRESS_INFORMATION,
            Code::SigningInformation => SMP_SIGNING_INFORMATION,
            Code::SecurityRequest => SMP_SECURITY_REQUEST,
            Code::PairingPublicKey => SMP_PAIRING_PUBLIC_KEY,
            Code::PairingDhKeyCheck => SMP_PAIRING_DHKEY_CHECK,
            Code::PairingKeypressNotification => SMP_PAIRING_KEYPRESS_NOTIFICATION,
        }
    }

    /// Total PDU length, code octet included
    pub fn pdu_len(&self) -> usize {
        match self {
            Code::PairingRequest | Code::PairingResponse => 7,
            Code::PairingConfirm
            | Code::PairingRandom
            | Code::EncryptionInformation
            | Code::IdentityInformation
            | Code::SigningInformation
            | Code::PairingDhKeyCheck => 17,
            Code::PairingFailed | Code::SecurityRequest | Code::PairingKeypressNotification => 2,
            Code::CentralIdentification => 11,
            Code::IdentityAddressInformation => 8,
            Code::PairingPublicKey => 65,
        }
    }
}

impl TryFrom<u8> for Code {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let code = match value {
            SMP_PAIRING_REQUEST => Code::PairingRequest,
            SMP_PAIRING_RESPONSE => Code::PairingResponse,
            SMP_PAIRING_CONFIRM => Code::PairingConfirm,
            SMP_PAIRING_RANDOM => Code::PairingRandom,
            SMP_PAIRING_FAILED => Code::PairingFailed,
            SMP_ENCRYPTION_INFORMATION => Code::EncryptionInformation,
            SMP_CENTRAL_IDENTIFICATION => Code::CentralIdentification,
            SMP_IDENTITY_INFORMATION => Code::IdentityInformation,
            SMP_IDENTITY_ADDRESS_INFORMATION => Code::IdentityAddressInformation,
            SMP_SIGNING_INFORMATION => Code::SigningInformation,
            SMP_SECURITY_REQUEST => Code::SecurityRequest,
            SMP_PAIRING_PUBLIC_KEY => Code::PairingPublicKey,
            SMP_PAIRING_DHKEY_CHECK => Code::PairingDhKeyCheck,
            SMP_PAIRING_KEYPRESS_NOTIFICATION => Code::PairingKeypressNotification,
            other => return Err(PacketError::UnknownCode(other)),
        };
        Ok(code)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::PairingRequest => "PAIRING_REQUEST",
            Code::PairingResponse => "PAIRING_RESPONSE",
            Code::PairingConfirm => "PAIRING_CONFIRM",
            Code::PairingRandom => "PAIRING_RANDOM",
            Code::PairingFailed => "PAIRING_FAILED",
            Code::EncryptionInformation => "ENCRYPTION_INFORMATION",
            Code::CentralIdentification => "CENTRAL_IDENTIFICATION",
            Code::IdentityInformation => "IDENTITY_INFORMATION",
            Code::IdentityAddressInformation => "IDENTITY_ADDRESS_INFORMATION",
            Code::SigningInformation => "SIGNING_INFORMATION",
            Code::SecurityRequest => "SECURITY_REQUEST",
            Code::PairingPublicKey => "PAIRING_PUBLIC_KEY",
            Code::PairingDhKeyCheck => "PAIRING_DH_KEY_CHECK",
            Code::PairingKeypressNotification => "PAIRING_KEYPRESS_NOTIFICATION",
        };
        f.write_str(name)
    }
}

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            SMP_IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            SMP_IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            SMP_IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

/// OOB data flag of the pairing request/response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OobDataFlag {
    #[default]
    NotPresent,
    Present,
}

impl OobDataFlag {
    pub fn to_u8(&self) -> u8 {
        match self {
            OobDataFlag::NotPresent => 0x00,
            OobDataFlag::Present => 0x01,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(OobDataFlag::NotPresent),
            0x01 => Some(OobDataFlag::Present),
            _ => None,
        }
    }
}

bitflags! {
    /// Authentication requirements
    ///
    /// Unknown bits are retained so that a received PDU re-serializes
    /// byte for byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AuthReq: u8 {
        const BONDING = SMP_AUTH_REQ_BONDING;
        const MITM = SMP_AUTH_REQ_MITM;
        const SC = SMP_AUTH_REQ_SC;
        const KEYPRESS = SMP_AUTH_REQ_KEYPRESS;
        const CT2 = SMP_AUTH_REQ_CT2;
    }
}

bitflags! {
    /// Key distribution mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyMask: u8 {
        /// LTK, EDIV and RAND (legacy pairing only)
        const ENC_KEY = SMP_KEY_DIST_ENC_KEY;
        /// IRK and identity address
        const ID_KEY = SMP_KEY_DIST_ID_KEY;
        /// CSRK
        const SIGN_KEY = SMP_KEY_DIST_SIGN_KEY;
        /// BR/EDR link key derivation
        const LINK_KEY = SMP_KEY_DIST_LINK_KEY;
    }
}

/// Pairing Failed reason codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingFailedReason {
    PasskeyEntryFailed,
    OobNotAvailable,
    AuthenticationRequirements,
    ConfirmValueFailed,
    PairingNotSupported,
    EncryptionKeySize,
    CommandNotSupported,
    UnspecifiedReason,
    RepeatedAttempts,
    InvalidParameters,
    DhKeyCheckFailed,
    NumericComparisonFailed,
    BrEdrPairingInProgress,
    CrossTransportKeyNotAllowed,
    KeyRejected,
}

impl PairingFailedReason {
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::PasskeyEntryFailed => SMP_REASON_PASSKEY_ENTRY_FAILED,
            Self::OobNotAvailable => SMP_REASON_OOB_NOT_AVAILABLE,
            Self::AuthenticationRequirements => SMP_REASON_AUTHENTICATION_REQUIREMENTS,
            Self::ConfirmValueFailed => SMP_REASON_CONFIRM_VALUE_FAILED,
            Self::PairingNotSupported => SMP_REASON_PAIRING_NOT_SUPPORTED,
            Self::EncryptionKeySize => SMP_REASON_ENCRYPTION_KEY_SIZE,
            Self::CommandNotSupported => SMP_REASON_COMMAND_NOT_SUPPORTED,
            Self::UnspecifiedReason => SMP_REASON_UNSPECIFIED_REASON,
            Self::RepeatedAttempts => SMP_REASON_REPEATED_ATTEMPTS,
            Self::InvalidParameters => SMP_REASON_INVALID_PARAMETERS,
            Self::DhKeyCheckFailed => SMP_REASON_DHKEY_CHECK_FAILED,
            Self::NumericComparisonFailed => SMP_REASON_NUMERIC_COMPARISON_FAILED,
            Self::BrEdrPairingInProgress => SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS,
            Self::CrossTransportKeyNotAllowed => SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED,
            Self::KeyRejected => SMP_REASON_KEY_REJECTED,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        let reason = match value {
            SMP_REASON_PASSKEY_ENTRY_FAILED => Self::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => Self::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => Self::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => Self::ConfirmValueFailed,
            SMP_REASON_PAIRING_NOT_SUPPORTED => Self::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => Self::EncryptionKeySize,
            SMP_REASON_COMMAND_NOT_SUPPORTED => Self::CommandNotSupported,
            SMP_REASON_UNSPECIFIED_REASON => Self::UnspecifiedReason,
            SMP_REASON_REPEATED_ATTEMPTS => Self::RepeatedAttempts,
            SMP_REASON_INVALID_PARAMETERS => Self::InvalidParameters,
            SMP_REASON_DHKEY_CHECK_FAILED => Self::DhKeyCheckFailed,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => Self::NumericComparisonFailed,
            SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS => Self::BrEdrPairingInProgress,
            SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED => Self::CrossTransportKeyNotAllowed,
            SMP_REASON_KEY_REJECTED => Self::KeyRejected,
            _ => return None,
        };
        Some(reason)
    }
}

impl fmt::Display for PairingFailedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PasskeyEntryFailed => "Passkey entry failed",
            Self::OobNotAvailable => "OOB data not available",
            Self::AuthenticationRequirements => "Authentication requirements not met",
            Self::ConfirmValueFailed => "Confirm value failed",
            Self::PairingNotSupported => "Pairing not supported",
            Self::EncryptionKeySize => "Encryption key size",
            Self::CommandNotSupported => "Command not supported",
            Self::UnspecifiedReason => "Unspecified reason",
            Self::RepeatedAttempts => "Repeated attempts",
            Self::InvalidParameters => "Invalid parameters",
            Self::DhKeyCheckFailed => "DHKey check failed",
            Self::NumericComparisonFailed => "Numeric comparison failed",
            Self::BrEdrPairingInProgress => "BR/EDR pairing in progress",
            Self::CrossTransportKeyNotAllowed => "Cross-transport key not allowed",
            Self::KeyRejected => "Key rejected",
        };
        f.write_str(text)
    }
}

/// Keypress notification types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypressNotificationType {
    EntryStarted,
    DigitEntered,
    DigitErased,
    Cleared,
    EntryCompleted,
}

impl KeypressNotificationType {
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::EntryStarted => SMP_KEYPRESS_ENTRY_STARTED,
            Self::DigitEntered => SMP_KEYPRESS_DIGIT_ENTERED,
            Self::DigitErased => SMP_KEYPRESS_DIGIT_ERASED,
            Self::Cleared => SMP_KEYPRESS_CLEARED,
            Self::EntryCompleted => SMP_KEYPRESS_ENTRY_COMPLETED,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_KEYPRESS_ENTRY_STARTED => Some(Self::EntryStarted),
            SMP_KEYPRESS_DIGIT_ENTERED => Some(Self::DigitEntered),
            SMP_KEYPRESS_DIGIT_ERASED => Some(Self::DigitErased),
            SMP_KEYPRESS_CLEARED => Some(Self::Cleared),
            SMP_KEYPRESS_ENTRY_COMPLETED => Some(Self::EntryCompleted),
            _ => None,
        }
    }
}

/// Pairing methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMethod {
    /// Just Works method - no user interaction
    JustWorks,
    /// Passkey Entry - one device enters a passkey
    PasskeyEntry,
    /// Numeric Comparison - user confirms matching numbers
    NumericComparison,
    /// Out of Band data
    OutOfBand,
}

impl fmt::Display for PairingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingMethod::JustWorks => write!(f, "Just Works"),
            PairingMethod::PasskeyEntry => write!(f, "Passkey Entry"),
            PairingMethod::NumericComparison => write!(f, "Numeric Comparison"),
            PairingMethod::OutOfBand => write!(f, "Out of Band"),
        }
    }
}

/// Pairing features exchanged in Phase 1
///
/// Used both for the local capabilities and for the payload of the
/// Pairing Request and Pairing Response PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingFeatures {
    /// IO capability
    pub io_capability: IoCapability,
    /// Whether OOB data from the peer is present
    pub oob_data_flag: OobDataFlag,
    /// Authentication requirements
    pub auth_req: AuthReq,
    /// Maximum encryption key size
    pub maximum_encryption_key_size: u8,
    /// Keys the initiator will distribute
    pub initiator_key_distribution: KeyMask,
    /// Keys the responder will distribute
    pub responder_key_distribution: KeyMask,
}

impl Default for PairingFeatures {
    fn default() -> Self {
        Self {
            io_capability: IoCapability::NoInputNoOutput,
            oob_data_flag: OobDataFlag::NotPresent,
            auth_req: AuthReq::BONDING | AuthReq::SC,
            maximum_encryption_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            initiator_key_distribution: KeyMask::ENC_KEY | KeyMask::ID_KEY | KeyMask::SIGN_KEY,
            responder_key_distribution: KeyMask::ENC_KEY | KeyMask::ID_KEY | KeyMask::SIGN_KEY,
        }
    }
}

/// Legacy and Secure Connections OOB data received from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OobData {
    /// Legacy pairing temporary key
    pub security_manager_tk_value: Option<[u8; 16]>,
    /// Secure Connections confirmation and random values
    pub le_sc: Option<ScOobData>,
}

/// Secure Connections OOB confirmation and random value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScOobData {
    pub c: [u8; 16],
    pub r: [u8; 16],
}
