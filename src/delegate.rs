//! User interaction during pairing.
use alloc::boxed::Box;

use crate::{Error, IoCapabilities, PeerId};

/// Result of a yes/no prompt, `true` to accept the pairing.
pub type ConfirmCallback = Box<dyn FnOnce(bool)>;

/// Result of a passkey prompt. A negative value means the user did not provide a passkey.
pub type PasskeyResponseCallback = Box<dyn FnOnce(i64)>;

/// How a passkey is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayMethod {
    /// The user compares the value with the one shown on the peer and confirms or rejects.
    Comparison,
    /// The user types the value on the peer. Nothing is confirmed locally.
    PeerEntry,
}

/// Application or user interface that takes part in pairing.
///
/// All prompts are asynchronous: the delegate answers through the supplied callback, possibly long
/// after the call returned. Answers that arrive after the pairing ended are discarded.
pub trait PairingDelegate {
    /// I/O capabilities of the local device.
    fn io_capability(&self) -> IoCapabilities;

    /// Pairing with `peer` finished, either with success or with `result` as the reason.
    fn complete_pairing(&self, peer: PeerId, result: Result<(), Error>);

    /// Ask the user for consent to pair with `peer`.
    fn confirm_pairing(&self, peer: PeerId, confirm: ConfirmCallback);

    /// Show `passkey` to the user using `method`.
    fn display_passkey(&self, peer: PeerId, passkey: u32, method: DisplayMethod, confirm: ConfirmCallback);

    /// Ask the user to enter the passkey displayed by `peer`.
    fn request_passkey(&self, peer: PeerId, respond: PasskeyResponseCallback);
}
