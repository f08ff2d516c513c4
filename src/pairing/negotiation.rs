use heapless::Vec;

use super::util::{
    expected_pairing_event, initiator_auth_requirements, initiator_pairing_action, is_pairing_authenticated,
    responder_auth_requirements, responder_pairing_action, PairingAction, PairingEvent,
};
use super::StatusCallback;
use crate::config::PAIRING_WAITERS;
use crate::{AuthRequirements, IoCapability, SecurityProperties};

/// Generation of a pairing on a connection.
///
/// Callbacks handed to the delegate carry the id of the pairing they belong to and are dropped when
/// that pairing is no longer the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingId(u32);

impl PairingId {
    pub(crate) const FIRST: PairingId = PairingId(0);

    pub(crate) fn next(self) -> PairingId {
        PairingId(self.0.wrapping_add(1))
    }
}

/// Association model decided for a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decision {
    pub action: PairingAction,
    pub expected_event: PairingEvent,
    pub authenticated: bool,
}

/// Data of a single pairing in progress.
pub(crate) struct Pairing {
    pub id: PairingId,
    pub initiator: bool,
    pub local_iocap: Option<IoCapability>,
    pub peer_iocap: Option<IoCapability>,
    pub decision: Option<Decision>,
    pub security_properties: Option<SecurityProperties>,
    callbacks: Vec<StatusCallback, PAIRING_WAITERS>,
}

impl Pairing {
    /// Pairing started locally. Callbacks are added with [`Pairing::add_callback`].
    pub fn new_initiator(id: PairingId) -> Self {
        Self {
            id,
            initiator: true,
            local_iocap: None,
            peer_iocap: None,
            decision: None,
            security_properties: None,
            callbacks: Vec::new(),
        }
    }

    /// Pairing started by the peer's IO Capability Response.
    pub fn new_responder(id: PairingId, peer_iocap: IoCapability) -> Self {
        Self {
            id,
            initiator: false,
            local_iocap: None,
            peer_iocap: Some(peer_iocap),
            decision: None,
            security_properties: None,
            callbacks: Vec::new(),
        }
    }

    /// Subscribe to the outcome. Hands the callback back if there is no room for it.
    pub fn add_callback(&mut self, callback: StatusCallback) -> Result<(), StatusCallback> {
        self.callbacks.push(callback)
    }

    pub fn into_callbacks(self) -> Vec<StatusCallback, PAIRING_WAITERS> {
        self.callbacks
    }

    /// Decide the association model once both capabilities are known.
    pub fn compute_pairing_data(&mut self) -> Option<Decision> {
        let local = self.local_iocap?;
        let peer = self.peer_iocap?;
        let action = if self.initiator {
            initiator_pairing_action(local, peer)
        } else {
            responder_pairing_action(peer, local)
        };
        let decision = Decision {
            action,
            expected_event: expected_pairing_event(local, peer),
            authenticated: is_pairing_authenticated(local, peer),
        };
        self.decision = Some(decision);
        Some(decision)
    }

    /// Authentication requirements to advertise for the local device.
    pub fn auth_requirements(&self) -> Option<AuthRequirements> {
        let local = self.local_iocap?;
        if self.initiator {
            Some(initiator_auth_requirements(local))
        } else {
            Some(responder_auth_requirements(local, self.peer_iocap?))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::*;

    #[test]
    fn responder_decision_swaps_roles() {
        let mut pairing = Pairing::new_responder(PairingId::FIRST, IoCapability::NoInputNoOutput);
        assert_eq!(pairing.compute_pairing_data(), None);

        pairing.local_iocap = Some(IoCapability::KeyboardOnly);
        let decision = pairing.compute_pairing_data().unwrap();
        assert_eq!(decision.action, PairingAction::GetConsent);
        assert_eq!(decision.expected_event, PairingEvent::UserConfirmationRequest);
        assert!(!decision.authenticated);
        assert_eq!(pairing.auth_requirements(), Some(AuthRequirements::GeneralBonding));
    }

    #[test]
    fn initiator_decision() {
        let mut pairing = Pairing::new_initiator(PairingId::FIRST.next());
        pairing.local_iocap = Some(IoCapability::DisplayYesNo);
        assert_eq!(pairing.auth_requirements(), Some(AuthRequirements::MitmGeneralBonding));
        pairing.peer_iocap = Some(IoCapability::DisplayYesNo);
        let decision = pairing.compute_pairing_data().unwrap();
        assert_eq!(decision.action, PairingAction::DisplayPasskey);
        assert!(decision.authenticated);
        assert_eq!(pairing.decision, Some(decision));
    }

    #[test]
    fn callbacks_are_bounded() {
        let mut pairing = Pairing::new_initiator(PairingId::FIRST);
        for _ in 0..PAIRING_WAITERS {
            assert!(pairing.add_callback(Box::new(|_, _| {})).is_ok());
        }
        assert!(pairing.add_callback(Box::new(|_, _| {})).is_err());
        assert_eq!(pairing.into_callbacks().len(), PAIRING_WAITERS);
    }
}
