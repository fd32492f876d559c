//! Pairing configuration
//!
//! Durations the pairing handler waits for peer PDUs, HCI events and user
//! decisions. The handler never hard-codes a timeout; the owner supplies one
//! through [`PairingConfig`].

use crate::smp::constants::{SMP_TIMEOUT_GENERAL, SMP_TIMEOUT_USER_AUTHORIZATION};
use std::time::Duration;

/// Timeouts applied by a pairing handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingConfig {
    /// Deadline for each SMP PDU or HCI event wait
    pub smp_timeout: Duration,
    /// Deadline for each user interface decision
    pub ui_timeout: Duration,
}

impl PairingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SMP transaction timeout
    pub fn with_smp_timeout(mut self, timeout: Duration) -> Self {
        self.smp_timeout = timeout;
        self
    }

    /// Set the user interface timeout
    pub fn with_ui_timeout(mut self, timeout: Duration) -> Self {
        self.ui_timeout = timeout;
        self
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            smp_timeout: Duration::from_millis(SMP_TIMEOUT_GENERAL),
            ui_timeout: Duration::from_millis(SMP_TIMEOUT_USER_AUTHORIZATION),
        }
    }
}
