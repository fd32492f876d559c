//! Security Manager
//!
//! Tracks LE connections and runs at most one pairing handler per peer
//! address. Incoming SMP PDUs, HCI events and user answers are routed to
//! the attempt they belong to; an unsolicited Pairing Request (as
//! peripheral) or Security Request (as central) starts a new attempt.
//! Finished attempts publish their outcome on the results channel.

use super::handler::{
    generate_oob_data, InitialInformations, MyOobData, PairingHandle, PairingHandlerLe,
};
use super::pdu::Command;
use super::result::PairingOutcome;
use super::transport::PairingTransport;
use super::types::{OobData, PairingFeatures, ScOobData};
use super::ui::{UiEvent, UserInterface};
use crate::config::PairingConfig;
use crate::error::SmpError;
use crate::gap::{AddressWithType, Role};
use crate::hci::HciEvent;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Local pairing parameters shared by every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDevice {
    pub capabilities: PairingFeatures,
    pub identity_address: AddressWithType,
    pub identity_resolving_key: [u8; 16],
}

/// An established LE connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeConnection {
    pub handle: u16,
    /// Local role on this link
    pub role: Role,
    pub local_address: AddressWithType,
    pub remote_address: AddressWithType,
    pub remote_name: String,
}

/// Receiving end of the pairing outcomes
pub type PairingResults = mpsc::UnboundedReceiver<(AddressWithType, PairingOutcome)>;

#[derive(Default)]
struct State {
    connections: HashMap<u16, LeConnection>,
    attempts: HashMap<AddressWithType, PairingHandle>,
    remote_oob_data: HashMap<AddressWithType, OobData>,
    my_oob_data: Option<MyOobData>,
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Security Manager for LE links
///
/// Attempts run on the tokio runtime the manager is called from.
pub struct SecurityManager {
    config: PairingConfig,
    local: LocalDevice,
    transport: Arc<dyn PairingTransport>,
    user_interface: Arc<dyn UserInterface>,
    state: Arc<Mutex<State>>,
    results: mpsc::UnboundedSender<(AddressWithType, PairingOutcome)>,
}

impl SecurityManager {
    pub fn new(
        config: PairingConfig,
        local: LocalDevice,
        transport: Arc<dyn PairingTransport>,
        user_interface: Arc<dyn UserInterface>,
    ) -> (Self, PairingResults) {
        let (results, receiver) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            local,
            transport,
            user_interface,
            state: Arc::new(Mutex::new(State::default())),
            results,
        };
        (manager, receiver)
    }

    pub fn on_connection_established(&self, connection: LeConnection) {
        debug!(
            "LE connection {:#06x} to {} as {}",
            connection.handle, connection.remote_address, connection.role
        );
        lock_state(&self.state)
            .connections
            .insert(connection.handle, connection);
    }

    /// Forget the connection and its OOB data, and abort its pairing
    /// attempt, if any
    pub fn on_disconnection(&self, handle: u16) {
        let mut state = lock_state(&self.state);
        if let Some(connection) = state.connections.remove(&handle) {
            state.remote_oob_data.remove(&connection.remote_address);
            if let Some(attempt) = state.attempts.get(&connection.remote_address) {
                debug!("Disconnected from {}, aborting pairing", connection.remote_address);
                attempt.cancel();
            }
        }
    }

    /// Start pairing on an established connection
    pub fn create_bond(&self, handle: u16) -> Result<(), SmpError> {
        let mut state = lock_state(&self.state);
        let connection = state
            .connections
            .get(&handle)
            .cloned()
            .ok_or(SmpError::UnknownConnection(handle))?;
        self.start_attempt(&mut state, &connection, false, None)
    }

    /// Abort the attempt with `address`
    pub fn cancel_bond(&self, address: &AddressWithType) -> Result<(), SmpError> {
        let state = lock_state(&self.state);
        let attempt = state
            .attempts
            .get(address)
            .ok_or(SmpError::NotPairing(address.address))?;
        attempt.cancel();
        Ok(())
    }

    /// Whether an attempt with `address` is running
    pub fn is_pairing(&self, address: &AddressWithType) -> bool {
        lock_state(&self.state).attempts.contains_key(address)
    }

    /// Deliver the user's answer to the attempt with `address`
    pub fn on_ui_action(&self, address: &AddressWithType, event: UiEvent) -> Result<(), SmpError> {
        let state = lock_state(&self.state);
        let attempt = state
            .attempts
            .get(address)
            .ok_or(SmpError::NotPairing(address.address))?;
        attempt.on_ui_action(event);
        Ok(())
    }

    /// Deliver an SMP PDU received on connection `handle`
    pub fn on_l2cap_packet(&self, handle: u16, data: &[u8]) -> Result<(), SmpError> {
        let mut state = lock_state(&self.state);
        let connection = state
            .connections
            .get(&handle)
            .cloned()
            .ok_or(SmpError::UnknownConnection(handle))?;

        if let Some(attempt) = state.attempts.get(&connection.remote_address) {
            attempt.on_l2cap_packet(data);
            return Ok(());
        }

        match (Command::parse(data)?, connection.role) {
            (Command::PairingRequest(pairing_request), Role::Peripheral) => {
                self.start_attempt(&mut state, &connection, true, Some(pairing_request))
            }
            (Command::SecurityRequest(request), Role::Central) => {
                debug!(
                    "Security Request from {} with {:?}",
                    connection.remote_address, request.auth_req
                );
                self.start_attempt(&mut state, &connection, true, None)
            }
            (command, _) => {
                info!(
                    "Dropping unsolicited {} from {}",
                    command.code(),
                    connection.remote_address
                );
                Ok(())
            }
        }
    }

    /// Route an encryption related HCI event by its connection handle
    pub fn on_hci_event(&self, event: HciEvent) -> Result<(), SmpError> {
        let handle = match event.connection_handle() {
            Some(handle) => handle,
            None => {
                debug!("Ignoring HCI event {:#04x}", event.event_code);
                return Ok(());
            }
        };

        let state = lock_state(&self.state);
        let connection = state
            .connections
            .get(&handle)
            .ok_or(SmpError::UnknownConnection(handle))?;
        match state.attempts.get(&connection.remote_address) {
            Some(attempt) => attempt.on_hci_event(event),
            None => debug!("No pairing with {}, ignoring HCI event", connection.remote_address),
        }
        Ok(())
    }

    /// Generate the OOB data to hand to peers
    ///
    /// Replaces the previous one. The key pair is reused by attempts whose
    /// peer reports having this data.
    pub fn create_local_oob_data(&self) -> ScOobData {
        let my_oob_data = generate_oob_data();
        let data = ScOobData {
            c: my_oob_data.c,
            r: my_oob_data.r,
        };
        lock_state(&self.state).my_oob_data = Some(my_oob_data);
        data
    }

    /// OOB data received from `address`, used by its next attempt
    pub fn set_remote_oob_data(&self, address: AddressWithType, data: OobData) {
        lock_state(&self.state).remote_oob_data.insert(address, data);
    }

    pub fn has_remote_oob_data(&self, address: &AddressWithType) -> bool {
        lock_state(&self.state).remote_oob_data.contains_key(address)
    }

    fn start_attempt(
        &self,
        state: &mut State,
        connection: &LeConnection,
        remotely_initiated: bool,
        pairing_request: Option<PairingFeatures>,
    ) -> Result<(), SmpError> {
        let address = connection.remote_address;
        if state.attempts.contains_key(&address) {
            warn!("Already pairing with {}", address);
            return Err(SmpError::AlreadyPairing(address.address));
        }

        let info = InitialInformations {
            my_role: connection.role,
            my_connection_address: connection.local_address,
            my_identity_address: self.local.identity_address,
            my_identity_resolving_key: self.local.identity_resolving_key,
            my_pairing_capabilities: self.local.capabilities,
            remotely_initiated,
            connection_handle: connection.handle,
            remote_connection_address: address,
            remote_name: connection.remote_name.clone(),
            pairing_request,
            remote_oob_data: state.remote_oob_data.remove(&address),
            my_oob_data: state.my_oob_data.clone(),
            user_interface: self.user_interface.clone(),
            transport: self.transport.clone(),
        };

        let attempts = Arc::clone(&self.state);
        let results = self.results.clone();
        let handle = PairingHandlerLe::spawn(info, self.config, move |outcome| {
            lock_state(&attempts).attempts.remove(&address);
            if results.send((address, outcome)).is_err() {
                debug!("Pairing results receiver dropped");
            }
        });

        info!(
            "Pairing with {} started{}",
            address,
            if remotely_initiated { " by the peer" } else { "" }
        );
        state.attempts.insert(address, handle);
        Ok(())
    }
}
