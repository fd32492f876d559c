//! User interface collaborator
//!
//! The pairing handler calls into a [`UserInterface`] to show prompts. The
//! user's answer travels back as a [`UiEvent`] through
//! [`super::PairingHandle::on_ui_action`]. Implementations must not block.

use crate::gap::AddressWithType;

/// What a prompt is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationData {
    pub address: AddressWithType,
    pub name: String,
    /// Passkey or comparison value, when the prompt shows one
    pub numeric_value: Option<u32>,
}

impl ConfirmationData {
    pub fn new(address: AddressWithType, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            numeric_value: None,
        }
    }

    pub fn with_numeric_value(mut self, value: u32) -> Self {
        self.numeric_value = Some(value);
        self
    }
}

/// Prompts shown while pairing
pub trait UserInterface: Send + Sync {
    /// Ask whether to accept a pairing started by the peer
    fn display_pairing_prompt(&self, address: &AddressWithType, name: &str);

    /// Dismiss any prompt for `address`
    fn cancel(&self, address: &AddressWithType);

    /// Numeric comparison: show the value and ask for yes/no
    fn display_confirm_value(&self, data: ConfirmationData);

    /// Ask the user to type the passkey shown on the peer
    fn display_enter_passkey_dialog(&self, data: ConfirmationData);

    /// Show the passkey the user must type on the peer
    fn display_passkey(&self, data: ConfirmationData);
}

/// Answer from the user interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    PairingAccepted(bool),
    ConfirmYesNo(bool),
    Passkey(u32),
}
