//! HCI protocol constants
//!
//! The subset of the HCI protocol used to drive LE link encryption.

// HCI packet type
pub const HCI_COMMAND_PKT: u8 = 0x01;

pub const OGF_LE: u8 = 0x08;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_START_ENCRYPTION: u16 = 0x0019;
pub const OCF_LE_LONG_TERM_KEY_REQUEST_REPLY: u16 = 0x001A;
pub const OCF_LE_LONG_TERM_KEY_REQUEST_NEGATIVE_REPLY: u16 = 0x001B;

// HCI Events
pub const EVT_ENCRYPTION_CHANGE: u8 = 0x08;
pub const EVT_ENCRYPTION_KEY_REFRESH_COMPLETE: u8 = 0x30;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_LONG_TERM_KEY_REQUEST: u8 = 0x05;
