//! Link collaborator
//!
//! Outgoing traffic of a pairing attempt. Both calls are fire-and-forget:
//! replies arrive as events on the handler's queue.

use super::pdu::Command;
use crate::hci::HciCommand;

pub trait PairingTransport: Send + Sync {
    /// Send an SMP PDU on the connection's SMP fixed channel
    fn send_l2cap_packet(&self, command: Command);

    /// Send an HCI command to the controller
    fn send_hci_command(&self, command: HciCommand);
}
