//! Secure Simple Pairing association model
// ([Vol 3] Part C, Section 5.2.2.6).
use crate::{AuthRequirements, IoCapability};

/// User interaction required to confirm a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingAction {
    /// Confirm without user interaction ("Just Works").
    Automatic,
    /// Ask the user for consent to pair without showing a value.
    GetConsent,
    /// Display a passkey and ask the user to confirm it matches the peer's.
    ComparePasskey,
    /// Display a passkey, or confirm automatically if the peer is the one comparing.
    DisplayPasskey,
    /// Ask the user to type in the passkey displayed by the peer.
    RequestPasskey,
}

/// Controller event expected to carry the user interaction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingEvent {
    /// HCI User Confirmation Request
    UserConfirmationRequest,
    /// HCI User Passkey Request
    UserPasskeyRequest,
    /// HCI User Passkey Notification
    UserPasskeyNotification,
}

impl PairingEvent {
    /// HCI event code of the event.
    pub const fn event_code(self) -> u8 {
        match self {
            PairingEvent::UserConfirmationRequest => 0x33,
            PairingEvent::UserPasskeyRequest => 0x34,
            PairingEvent::UserPasskeyNotification => 0x3b,
        }
    }
}

/// Action to take as pairing initiator.
pub fn initiator_pairing_action(initiator: IoCapability, responder: IoCapability) -> PairingAction {
    if initiator == IoCapability::NoInputNoOutput {
        return PairingAction::Automatic;
    }
    if responder == IoCapability::NoInputNoOutput {
        if initiator == IoCapability::DisplayYesNo {
            return PairingAction::GetConsent;
        }
        return PairingAction::Automatic;
    }
    if initiator == IoCapability::KeyboardOnly {
        return PairingAction::RequestPasskey;
    }
    if responder == IoCapability::DisplayOnly {
        if initiator == IoCapability::DisplayYesNo {
            return PairingAction::ComparePasskey;
        }
        return PairingAction::Automatic;
    }
    PairingAction::DisplayPasskey
}

/// Action to take as pairing responder.
///
/// Mostly the initiator table with the roles swapped, except where the responder has to obtain
/// consent or compare values itself.
pub fn responder_pairing_action(initiator: IoCapability, responder: IoCapability) -> PairingAction {
    match (initiator, responder) {
        (IoCapability::NoInputNoOutput, IoCapability::KeyboardOnly) => PairingAction::GetConsent,
        (IoCapability::DisplayYesNo, IoCapability::DisplayYesNo) => PairingAction::ComparePasskey,
        _ => initiator_pairing_action(responder, initiator),
    }
}

/// Controller event that carries the user interaction for this pair of capabilities.
pub fn expected_pairing_event(local: IoCapability, peer: IoCapability) -> PairingEvent {
    if local == IoCapability::NoInputNoOutput || peer == IoCapability::NoInputNoOutput {
        return PairingEvent::UserConfirmationRequest;
    }
    if local == IoCapability::KeyboardOnly {
        return PairingEvent::UserPasskeyRequest;
    }
    if peer == IoCapability::KeyboardOnly {
        return PairingEvent::UserPasskeyNotification;
    }
    PairingEvent::UserConfirmationRequest
}

/// Whether the association model provides MITM protection.
pub fn is_pairing_authenticated(local: IoCapability, peer: IoCapability) -> bool {
    if local == IoCapability::NoInputNoOutput || peer == IoCapability::NoInputNoOutput {
        return false;
    }
    if local == IoCapability::DisplayYesNo && peer == IoCapability::DisplayYesNo {
        return true;
    }
    local == IoCapability::KeyboardOnly || peer == IoCapability::KeyboardOnly
}

/// Authentication requirements sent in an IO Capability Request Reply as initiator.
pub fn initiator_auth_requirements(local: IoCapability) -> AuthRequirements {
    if local == IoCapability::NoInputNoOutput {
        AuthRequirements::GeneralBonding
    } else {
        AuthRequirements::MitmGeneralBonding
    }
}

/// Authentication requirements sent in an IO Capability Request Reply as responder.
pub fn responder_auth_requirements(local: IoCapability, peer: IoCapability) -> AuthRequirements {
    if is_pairing_authenticated(local, peer) {
        AuthRequirements::MitmGeneralBonding
    } else {
        AuthRequirements::GeneralBonding
    }
}

#[cfg(test)]
mod tests {
    use super::PairingAction::*;
    use super::PairingEvent::*;
    use super::*;
    use crate::IoCapabilities;
    use crate::IoCapabilities::{DisplayOnly, DisplayYesNo, KeyboardDisplay, KeyboardOnly, NoInputNoOutput};

    // (local, peer, initiator action, responder action, expected event, authenticated)
    const TABLE: [(IoCapabilities, IoCapabilities, PairingAction, PairingAction, PairingEvent, bool); 25] = [
        (DisplayOnly, DisplayOnly, Automatic, Automatic, UserConfirmationRequest, false),
        (DisplayOnly, DisplayYesNo, DisplayPasskey, DisplayPasskey, UserConfirmationRequest, false),
        (DisplayOnly, KeyboardOnly, DisplayPasskey, DisplayPasskey, UserPasskeyNotification, true),
        (DisplayOnly, NoInputNoOutput, Automatic, Automatic, UserConfirmationRequest, false),
        (DisplayOnly, KeyboardDisplay, DisplayPasskey, DisplayPasskey, UserConfirmationRequest, false),
        (DisplayYesNo, DisplayOnly, ComparePasskey, ComparePasskey, UserConfirmationRequest, false),
        (DisplayYesNo, DisplayYesNo, DisplayPasskey, ComparePasskey, UserConfirmationRequest, true),
        (DisplayYesNo, KeyboardOnly, DisplayPasskey, DisplayPasskey, UserPasskeyNotification, true),
        (DisplayYesNo, NoInputNoOutput, GetConsent, GetConsent, UserConfirmationRequest, false),
        (DisplayYesNo, KeyboardDisplay, DisplayPasskey, ComparePasskey, UserConfirmationRequest, true),
        (KeyboardOnly, DisplayOnly, RequestPasskey, RequestPasskey, UserPasskeyRequest, true),
        (KeyboardOnly, DisplayYesNo, RequestPasskey, RequestPasskey, UserPasskeyRequest, true),
        (KeyboardOnly, KeyboardOnly, RequestPasskey, RequestPasskey, UserPasskeyRequest, true),
        (KeyboardOnly, NoInputNoOutput, Automatic, GetConsent, UserConfirmationRequest, false),
        (KeyboardOnly, KeyboardDisplay, RequestPasskey, RequestPasskey, UserPasskeyRequest, true),
        (NoInputNoOutput, DisplayOnly, Automatic, Automatic, UserConfirmationRequest, false),
        (NoInputNoOutput, DisplayYesNo, Automatic, Automatic, UserConfirmationRequest, false),
        (NoInputNoOutput, KeyboardOnly, Automatic, Automatic, UserConfirmationRequest, false),
        (NoInputNoOutput, NoInputNoOutput, Automatic, Automatic, UserConfirmationRequest, false),
        (NoInputNoOutput, KeyboardDisplay, Automatic, Automatic, UserConfirmationRequest, false),
        (KeyboardDisplay, DisplayOnly, ComparePasskey, ComparePasskey, UserConfirmationRequest, false),
        (KeyboardDisplay, DisplayYesNo, DisplayPasskey, ComparePasskey, UserConfirmationRequest, true),
        (KeyboardDisplay, KeyboardOnly, DisplayPasskey, DisplayPasskey, UserPasskeyNotification, true),
        (KeyboardDisplay, NoInputNoOutput, GetConsent, GetConsent, UserConfirmationRequest, false),
        (KeyboardDisplay, KeyboardDisplay, DisplayPasskey, ComparePasskey, UserConfirmationRequest, true),
    ];

    #[test]
    fn initiator_action_table() {
        for (local, peer, action, _, _, _) in TABLE {
            assert_eq!(
                initiator_pairing_action(local.into(), peer.into()),
                action,
                "initiator {:?}, responder {:?}",
                local,
                peer
            );
        }
    }

    #[test]
    fn responder_action_table() {
        // As responder the local device is the second argument
        for (local, peer, _, action, _, _) in TABLE {
            assert_eq!(
                responder_pairing_action(peer.into(), local.into()),
                action,
                "initiator {:?}, responder {:?}",
                peer,
                local
            );
        }
    }

    #[test]
    fn expected_event_table() {
        for (local, peer, _, _, event, _) in TABLE {
            assert_eq!(
                expected_pairing_event(local.into(), peer.into()),
                event,
                "local {:?}, peer {:?}",
                local,
                peer
            );
        }
    }

    #[test]
    fn authenticated_table() {
        for (local, peer, _, _, _, authenticated) in TABLE {
            assert_eq!(
                is_pairing_authenticated(local.into(), peer.into()),
                authenticated,
                "local {:?}, peer {:?}",
                local,
                peer
            );
        }
    }

    #[test]
    fn authenticated_is_symmetric() {
        for (local, peer, _, _, _, authenticated) in TABLE {
            assert_eq!(is_pairing_authenticated(peer.into(), local.into()), authenticated);
        }
    }

    #[test]
    fn numeric_comparison() {
        let cap = IoCapability::DisplayYesNo;
        assert_eq!(responder_pairing_action(cap, cap), ComparePasskey);
        assert_eq!(expected_pairing_event(cap, cap), UserConfirmationRequest);
        assert!(is_pairing_authenticated(cap, cap));
    }

    #[test]
    fn responder_consent_is_special_cased() {
        let initiator = IoCapability::NoInputNoOutput;
        let responder = IoCapability::KeyboardOnly;
        assert_eq!(responder_pairing_action(initiator, responder), GetConsent);
        assert_eq!(initiator_pairing_action(responder, initiator), Automatic);
    }

    #[test]
    fn auth_requirements() {
        for (local, peer, _, _, _, authenticated) in TABLE {
            let expected = if local == NoInputNoOutput {
                AuthRequirements::GeneralBonding
            } else {
                AuthRequirements::MitmGeneralBonding
            };
            assert_eq!(initiator_auth_requirements(local.into()), expected);
            assert_eq!(
                responder_auth_requirements(local.into(), peer.into()).man_in_the_middle(),
                authenticated
            );
        }
    }

    #[test]
    fn event_codes() {
        assert_eq!(UserConfirmationRequest.event_code(), 0x33);
        assert_eq!(UserPasskeyRequest.event_code(), 0x34);
        assert_eq!(UserPasskeyNotification.event_code(), 0x3b);
    }
}
