//! # BR/EDR pairing state machine
//!
//! Tracks Secure Simple Pairing on a single ACL link as it is driven by controller events
//! ([Vol 2] Part F, Section 4.2).
//!
//! ```text
//!  Initiator                                   Responder
//!  ---------                                   ---------
//!  Idle                                        Idle
//!   | initiate_pairing                          | on_io_capability_response
//!  InitiatorPairingStarted                     ResponderWaitIoCapRequest
//!   | on_io_capability_request                  | on_io_capability_request
//!  InitiatorWaitIoCapResponse                   |
//!   | on_io_capability_response                 |
//!   +------------------+  +---------------------+
//!                      v  v
//!        WaitUserConfirmationRequest / WaitUserPasskeyRequest / WaitUserPasskeyNotification
//!                       |
//!        WaitPairingComplete  (on_simple_pairing_complete)
//!                       |
//!        WaitLinkKey          (on_link_key_notification)
//!                       |
//!        InitiatorWaitAuthComplete (initiator only, on_authentication_complete)
//!                       |
//!        WaitEncryption       (encryption change)
//!                       |
//!        Idle
//! ```
//!
//! Any event that does not fit the current state moves the machine to `Failed`.
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};

use bt_hci::param::{ConnHandle, Status};

use crate::delegate::{ConfirmCallback, DisplayMethod, PairingDelegate, PasskeyResponseCallback};
use crate::link::{EncryptionChangeHook, Link};
use crate::pairing::negotiation::{Pairing, PairingId};
use crate::pairing::util::{PairingAction, PairingEvent};
use crate::{AuthRequirements, Error, IoCapability, LinkKey, LinkKeyType, PeerId, SecurityLevel, SecurityProperties};

mod negotiation;
pub mod util;

/// Outcome of a pairing request, called once.
pub type StatusCallback = Box<dyn FnOnce(ConnHandle, Result<(), Error>)>;

/// Outcome of every pairing on the link, called each time a pairing ends.
pub type OwnerStatusCallback = Box<dyn Fn(ConnHandle, Result<(), Error>)>;

/// Reply to a User Confirmation Request, `true` to accept.
pub type UserConfirmationCallback = Box<dyn FnOnce(bool)>;

/// Reply to a User Passkey Request, `None` to reject.
pub type UserPasskeyCallback = Box<dyn FnOnce(Option<u32>)>;

/// State of the pairing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No pairing in progress.
    Idle,
    /// Pairing requested locally, waiting for the controller to request our IO capabilities.
    InitiatorPairingStarted,
    /// Our IO capabilities were sent, waiting for the peer's.
    InitiatorWaitIoCapResponse,
    /// The peer sent its IO capabilities, waiting for the controller to request ours.
    ResponderWaitIoCapRequest,
    /// Waiting for a User Confirmation Request.
    WaitUserConfirmationRequest,
    /// Waiting for a User Passkey Request.
    WaitUserPasskeyRequest,
    /// Waiting for a User Passkey Notification.
    WaitUserPasskeyNotification,
    /// Waiting for Simple Pairing Complete.
    WaitPairingComplete,
    /// Waiting for the Link Key Notification.
    WaitLinkKey,
    /// Waiting for Authentication Complete.
    InitiatorWaitAuthComplete,
    /// Waiting for encryption to be enabled.
    WaitEncryption,
    /// Pairing failed. Only a new pairing request is accepted.
    Failed,
}

impl State {
    fn for_pairing_event(event: PairingEvent) -> State {
        match event {
            PairingEvent::UserConfirmationRequest => State::WaitUserConfirmationRequest,
            PairingEvent::UserPasskeyRequest => State::WaitUserPasskeyRequest,
            PairingEvent::UserPasskeyNotification => State::WaitUserPasskeyNotification,
        }
    }
}

impl AsRef<str> for State {
    fn as_ref(&self) -> &str {
        match self {
            State::Idle => "Idle",
            State::InitiatorPairingStarted => "InitiatorPairingStarted",
            State::InitiatorWaitIoCapResponse => "InitiatorWaitIoCapResponse",
            State::ResponderWaitIoCapRequest => "ResponderWaitIoCapRequest",
            State::WaitUserConfirmationRequest => "WaitUserConfirmationRequest",
            State::WaitUserPasskeyRequest => "WaitUserPasskeyRequest",
            State::WaitUserPasskeyNotification => "WaitUserPasskeyNotification",
            State::WaitPairingComplete => "WaitPairingComplete",
            State::WaitLinkKey => "WaitLinkKey",
            State::InitiatorWaitAuthComplete => "InitiatorWaitAuthComplete",
            State::WaitEncryption => "WaitEncryption",
            State::Failed => "Failed",
        }
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.as_ref())
    }
}

/// What the caller of [`PairingState::initiate_pairing`] should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitiatorAction {
    /// Send HCI Authentication Requested for the link.
    SendAuthenticationRequest,
    /// Pairing is already running or can't run, the callback will be (or was) called.
    DoNotSendAuthenticationRequest,
}

/// Pairing state machine of one BR/EDR link.
///
/// Events must be delivered serially from a single execution context. The state machine installs
/// an encryption change callback on the link and removes it when dropped.
pub struct PairingState<L: Link + 'static> {
    inner: Rc<Inner<L>>,
    hook: EncryptionChangeHook<L>,
}

struct Inner<L: Link> {
    peer_id: PeerId,
    link: Rc<L>,
    state: Cell<State>,
    current_pairing: RefCell<Option<Pairing>>,
    next_pairing_id: Cell<PairingId>,
    delegate: RefCell<Option<Rc<dyn PairingDelegate>>>,
    status_callback: OwnerStatusCallback,
}

impl<L: Link + 'static> PairingState<L> {
    /// Create the state machine for `link`. `status_callback` receives the outcome of every pairing.
    pub fn new(peer_id: PeerId, link: Rc<L>, status_callback: OwnerStatusCallback) -> Self {
        let inner = Rc::new(Inner {
            peer_id,
            link: link.clone(),
            state: Cell::new(State::Idle),
            current_pairing: RefCell::new(None),
            next_pairing_id: Cell::new(PairingId::FIRST),
            delegate: RefCell::new(None),
            status_callback,
        });
        let weak = Rc::downgrade(&inner);
        let hook = EncryptionChangeHook::install(
            link,
            Box::new(move |status, enabled| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_encryption_change(status, enabled);
                }
            }),
        );
        Self { inner, hook }
    }

    /// Set or clear the pairing delegate.
    pub fn set_pairing_delegate(&self, delegate: Option<Rc<dyn PairingDelegate>>) {
        self.inner.delegate.replace(delegate);
    }

    /// Peer on the other end of the link.
    pub fn peer_id(&self) -> PeerId {
        self.inner.peer_id
    }

    /// Connection handle of the link.
    pub fn handle(&self) -> ConnHandle {
        self.inner.handle()
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.inner.state.get()
    }

    /// Whether a pairing is in progress.
    pub fn is_pairing(&self) -> bool {
        self.inner.is_pairing()
    }

    /// Role of the pairing in progress, `true` if the local device initiated it.
    pub fn initiator(&self) -> Option<bool> {
        self.inner.current_pairing.borrow().as_ref().map(|p| p.initiator)
    }

    /// Association model of the pairing in progress, once both IO capabilities are known.
    pub fn pairing_action(&self) -> Option<PairingAction> {
        self.inner
            .current_pairing
            .borrow()
            .as_ref()
            .and_then(|p| p.decision)
            .map(|d| d.action)
    }

    /// Authentication requirements to send along with the local IO capability.
    pub fn auth_requirements(&self) -> Option<AuthRequirements> {
        self.inner
            .current_pairing
            .borrow()
            .as_ref()
            .and_then(|p| p.auth_requirements())
    }

    /// Security properties of the link key received in the pairing in progress.
    pub fn security_properties(&self) -> Option<SecurityProperties> {
        self.inner
            .current_pairing
            .borrow()
            .as_ref()
            .and_then(|p| p.security_properties)
    }

    /// Request pairing on the link.
    ///
    /// `status_cb` is called exactly once with the outcome. Concurrent requests share a single
    /// pairing, only the first one asks for an Authentication Request to be sent.
    pub fn initiate_pairing(&self, status_cb: StatusCallback) -> InitiatorAction {
        self.inner.initiate_pairing(status_cb)
    }

    /// Controller sent an IO Capability Request. Returns the capability to reply with, or `None`
    /// to send a negative reply.
    pub fn on_io_capability_request(&self) -> Option<IoCapability> {
        self.inner.on_io_capability_request()
    }

    /// Controller sent the peer's IO Capability Response.
    pub fn on_io_capability_response(&self, peer_iocap: IoCapability) {
        self.inner.on_io_capability_response(peer_iocap)
    }

    /// Controller sent a User Confirmation Request with `numeric_value`.
    pub fn on_user_confirmation_request(&self, numeric_value: u32, cb: UserConfirmationCallback) {
        self.inner.on_user_confirmation_request(numeric_value, cb)
    }

    /// Controller sent a User Passkey Request.
    pub fn on_user_passkey_request(&self, cb: UserPasskeyCallback) {
        self.inner.on_user_passkey_request(cb)
    }

    /// Controller sent a User Passkey Notification with the passkey to display.
    pub fn on_user_passkey_notification(&self, numeric_value: u32) {
        self.inner.on_user_passkey_notification(numeric_value)
    }

    /// Controller sent Simple Pairing Complete.
    pub fn on_simple_pairing_complete(&self, status: Status) {
        self.inner.on_simple_pairing_complete(status)
    }

    /// Controller sent a Link Key Notification.
    pub fn on_link_key_notification(&self, link_key: LinkKey, key_type: LinkKeyType) {
        self.inner.on_link_key_notification(link_key, key_type)
    }

    /// Controller sent Authentication Complete.
    pub fn on_authentication_complete(&self, status: Status) {
        self.inner.on_authentication_complete(status)
    }

    /// Encryption of the link changed. Also delivered through the link's encryption change callback.
    pub fn on_encryption_change(&self, status: Status, enabled: bool) {
        self.inner.on_encryption_change(status, enabled)
    }
}

impl<L: Link + 'static> Drop for PairingState<L> {
    fn drop(&mut self) {
        // Pending callbacks are dropped along with the pairing
        self.hook.release();
    }
}

impl<L: Link + 'static> Inner<L> {
    fn handle(&self) -> ConnHandle {
        self.link.handle()
    }

    fn delegate(&self) -> Option<Rc<dyn PairingDelegate>> {
        self.delegate.borrow().clone()
    }

    fn is_pairing(&self) -> bool {
        self.current_pairing.borrow().is_some()
    }

    fn is_current(&self, id: PairingId) -> bool {
        self.current_pairing.borrow().as_ref().map(|p| p.id) == Some(id)
    }

    fn next_pairing_id(&self) -> PairingId {
        let id = self.next_pairing_id.get();
        self.next_pairing_id.set(id.next());
        id
    }

    fn with_pairing<R>(&self, f: impl FnOnce(&mut Pairing) -> R) -> Option<R> {
        let mut current = self.current_pairing.borrow_mut();
        debug_assert!(current.is_some(), "No pairing in state {}", self.state.get());
        current.as_mut().map(f)
    }

    fn initiate_pairing(&self, status_cb: StatusCallback) -> InitiatorAction {
        // Only the caller is told if there is nobody to confirm the pairing
        if self.delegate().is_none() {
            debug!(
                "[bredr] No pairing delegate for link {:?} (id: {}), not pairing",
                self.handle(),
                self.peer_id
            );
            status_cb(self.handle(), Err(Error::NotReady));
            return InitiatorAction::DoNotSendAuthenticationRequest;
        }

        if self.state.get() == State::Idle {
            debug_assert!(!self.is_pairing());
            let mut pairing = Pairing::new_initiator(self.next_pairing_id());
            if let Err(status_cb) = pairing.add_callback(status_cb) {
                status_cb(self.handle(), Err(Error::OutOfMemory));
                return InitiatorAction::DoNotSendAuthenticationRequest;
            }
            self.current_pairing.replace(Some(pairing));
            debug!("[bredr] Initiating pairing on {:?} (id: {})", self.handle(), self.peer_id);
            self.state.set(State::InitiatorPairingStarted);
            return InitiatorAction::SendAuthenticationRequest;
        }

        // Several users of the link may ask for pairing at once, they all wait for the same result
        let rejected = match self.current_pairing.borrow_mut().as_mut() {
            Some(pairing) => {
                debug!(
                    "[bredr] Already pairing {:?} (id: {}), waiting for completion",
                    self.handle(),
                    self.peer_id
                );
                pairing.add_callback(status_cb).err().map(|cb| (cb, Error::OutOfMemory))
            }
            None => {
                debug_assert!(self.state.get() == State::Failed);
                Some((status_cb, Error::Canceled))
            }
        };
        if let Some((status_cb, error)) = rejected {
            status_cb(self.handle(), Err(error));
        }
        InitiatorAction::DoNotSendAuthenticationRequest
    }

    fn on_io_capability_request(&self) -> Option<IoCapability> {
        match self.state.get() {
            State::InitiatorPairingStarted => {
                let Some(delegate) = self.delegate() else {
                    return self.reject_without_delegate();
                };
                let local_iocap = IoCapability::from(delegate.io_capability());
                self.with_pairing(|p| {
                    debug_assert!(p.initiator);
                    p.local_iocap = Some(local_iocap);
                })?;
                self.state.set(State::InitiatorWaitIoCapResponse);
                Some(local_iocap)
            }
            State::ResponderWaitIoCapRequest => {
                let Some(delegate) = self.delegate() else {
                    return self.reject_without_delegate();
                };
                let local_iocap = IoCapability::from(delegate.io_capability());
                self.with_pairing(|p| {
                    debug_assert!(!p.initiator);
                    p.local_iocap = Some(local_iocap);
                })?;
                self.compute_pairing_data("on_io_capability_request");
                Some(local_iocap)
            }
            _ => {
                self.fail_with_unexpected_event("on_io_capability_request");
                None
            }
        }
    }

    fn reject_without_delegate(&self) -> Option<IoCapability> {
        error!(
            "[bredr] No pairing delegate for link {:?} (id: {}), not pairing",
            self.handle(),
            self.peer_id
        );
        self.state.set(State::Idle);
        self.signal_status(Err(Error::NotReady));
        None
    }

    fn on_io_capability_response(&self, peer_iocap: IoCapability) {
        match self.state.get() {
            State::Idle => {
                debug_assert!(!self.is_pairing());
                let pairing = Pairing::new_responder(self.next_pairing_id(), peer_iocap);
                self.current_pairing.replace(Some(pairing));
                // Local capabilities are gathered on the IO Capability Request, where a missing
                // delegate can still reject the pairing
                self.state.set(State::ResponderWaitIoCapRequest);
            }
            State::InitiatorWaitIoCapResponse => {
                if self.with_pairing(|p| p.peer_iocap = Some(peer_iocap)).is_none() {
                    self.fail_with_unexpected_event("on_io_capability_response");
                    return;
                }
                self.compute_pairing_data("on_io_capability_response");
            }
            _ => self.fail_with_unexpected_event("on_io_capability_response"),
        }
    }

    fn compute_pairing_data(&self, handler_name: &str) {
        let decision = {
            let mut current = self.current_pairing.borrow_mut();
            current.as_mut().and_then(|p| p.compute_pairing_data().map(|d| (p.initiator, d)))
        };
        let Some((initiator, decision)) = decision else {
            debug_assert!(false, "Pairing decision without both IO capabilities");
            self.fail_with_unexpected_event(handler_name);
            return;
        };
        debug!(
            "[bredr] {:?} (id: {}): as {}, expecting {} pairing using {:?} on {:?} (0x{:02x})",
            self.handle(),
            self.peer_id,
            if initiator { "initiator" } else { "responder" },
            if decision.authenticated {
                "authenticated"
            } else {
                "unauthenticated"
            },
            decision.action,
            decision.expected_event,
            decision.expected_event.event_code()
        );
        self.state.set(State::for_pairing_event(decision.expected_event));
    }

    fn pairing_action(&self) -> Option<(PairingId, PairingAction)> {
        self.with_pairing(|p| p.decision.map(|d| (p.id, d.action))).flatten()
    }

    fn on_user_confirmation_request(self: &Rc<Self>, numeric_value: u32, cb: UserConfirmationCallback) {
        if self.state.get() != State::WaitUserConfirmationRequest {
            self.fail_with_unexpected_event("on_user_confirmation_request");
            cb(false);
            return;
        }
        let Some(delegate) = self.delegate() else {
            self.fail_without_delegate("on_user_confirmation_request");
            cb(false);
            return;
        };
        let Some((id, action)) = self.pairing_action() else {
            self.fail_with_unexpected_event("on_user_confirmation_request");
            cb(false);
            return;
        };
        self.state.set(State::WaitPairingComplete);

        match action {
            // Numeric comparison with automatic confirmation on this side is still shown to the
            // delegate, which decides whether to confirm on its own
            PairingAction::DisplayPasskey | PairingAction::ComparePasskey => {
                delegate.display_passkey(
                    self.peer_id,
                    numeric_value,
                    DisplayMethod::Comparison,
                    self.relay_confirmation(id, cb),
                );
            }
            PairingAction::GetConsent => {
                delegate.confirm_pairing(self.peer_id, self.relay_confirmation(id, cb));
            }
            PairingAction::Automatic => {
                debug!(
                    "[bredr] {:?} (id: {}): automatically confirming User Confirmation Request",
                    self.handle(),
                    self.peer_id
                );
                cb(true);
            }
            PairingAction::RequestPasskey => {
                debug_assert!(false, "User Confirmation Request for passkey entry");
                self.fail_with_unexpected_event("on_user_confirmation_request");
                cb(false);
            }
        }
    }

    fn relay_confirmation(self: &Rc<Self>, id: PairingId, cb: UserConfirmationCallback) -> ConfirmCallback {
        let weak: Weak<Self> = Rc::downgrade(self);
        Box::new(move |confirm| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if !this.is_current(id) {
                return;
            }
            debug!(
                "[bredr] {:?} (id: {}): {} User Confirmation Request",
                this.handle(),
                this.peer_id,
                if confirm { "Confirming" } else { "Canceling" }
            );
            cb(confirm);
        })
    }

    fn on_user_passkey_request(self: &Rc<Self>, cb: UserPasskeyCallback) {
        if self.state.get() != State::WaitUserPasskeyRequest {
            self.fail_with_unexpected_event("on_user_passkey_request");
            cb(None);
            return;
        }
        let Some(delegate) = self.delegate() else {
            self.fail_without_delegate("on_user_passkey_request");
            cb(None);
            return;
        };
        let Some((id, action)) = self.pairing_action() else {
            self.fail_with_unexpected_event("on_user_passkey_request");
            cb(None);
            return;
        };
        debug_assert!(action == PairingAction::RequestPasskey);
        self.state.set(State::WaitPairingComplete);

        let weak: Weak<Self> = Rc::downgrade(self);
        let respond: PasskeyResponseCallback = Box::new(move |passkey| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if !this.is_current(id) {
                return;
            }
            debug!(
                "[bredr] {:?} (id: {}): replying {} to User Passkey Request",
                this.handle(),
                this.peer_id,
                passkey
            );
            cb(u32::try_from(passkey).ok());
        });
        delegate.request_passkey(self.peer_id, respond);
    }

    fn on_user_passkey_notification(self: &Rc<Self>, numeric_value: u32) {
        if self.state.get() != State::WaitUserPasskeyNotification {
            self.fail_with_unexpected_event("on_user_passkey_notification");
            return;
        }
        let Some(delegate) = self.delegate() else {
            self.fail_without_delegate("on_user_passkey_notification");
            return;
        };
        let Some((id, _)) = self.pairing_action() else {
            self.fail_with_unexpected_event("on_user_passkey_notification");
            return;
        };
        self.state.set(State::WaitPairingComplete);

        let weak: Weak<Self> = Rc::downgrade(self);
        let confirm: ConfirmCallback = Box::new(move |confirm| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if !this.is_current(id) {
                return;
            }
            debug!(
                "[bredr] {:?} (id: {}): can't {} pairing from the Passkey Notification side",
                this.handle(),
                this.peer_id,
                if confirm { "confirm" } else { "cancel" }
            );
        });
        delegate.display_passkey(self.peer_id, numeric_value, DisplayMethod::PeerEntry, confirm);
    }

    fn on_simple_pairing_complete(&self, status: Status) {
        if self.state.get() != State::WaitPairingComplete {
            self.fail_with_unexpected_event("on_simple_pairing_complete");
            return;
        }
        debug_assert!(self.is_pairing());

        if let Err(error) = status.to_result() {
            info!(
                "[bredr] Pairing failed on link {:?} (id: {}): {:?}",
                self.handle(),
                self.peer_id,
                error
            );
            if let Some(delegate) = self.delegate() {
                delegate.complete_pairing(self.peer_id, Err(Error::Failed));
            }
            self.state.set(State::Failed);
            self.signal_status(Err(Error::Hci(error)));
            return;
        }

        match self.delegate() {
            Some(delegate) => delegate.complete_pairing(self.peer_id, Ok(())),
            None => warn!(
                "[bredr] {:?} (id: {}): pairing delegate gone before pairing completed",
                self.handle(),
                self.peer_id
            ),
        }
        self.state.set(State::WaitLinkKey);
    }

    fn on_link_key_notification(&self, link_key: LinkKey, key_type: LinkKeyType) {
        // Keys from controllers in debug mode are public knowledge
        if key_type == LinkKeyType::DebugCombination {
            warn!(
                "[bredr] Pairing on link {:?} (id: {}) resulted in insecure Debug Combination link key",
                self.handle(),
                self.peer_id
            );
            self.state.set(State::Failed);
            self.signal_status(Err(Error::InsufficientSecurity));
            return;
        }

        // Outside of pairing, only changes of the current link key are allowed
        if self.state.get() == State::Idle && key_type == LinkKeyType::ChangedCombination {
            if self.link.link_key().is_none() {
                warn!(
                    "[bredr] Got Changed Combination key but link {:?} (id: {}) has no current key",
                    self.handle(),
                    self.peer_id
                );
                self.state.set(State::Failed);
                self.signal_status(Err(Error::InsufficientSecurity));
                return;
            }
            debug!("[bredr] Changing link key on {:?} (id: {})", self.handle(), self.peer_id);
            self.link.set_link_key(link_key, key_type);
            return;
        } else if self.state.get() != State::WaitLinkKey {
            self.fail_with_unexpected_event("on_link_key_notification");
            return;
        }

        // Both the controller and the host computed the association model, they must agree
        let security_properties = SecurityProperties::from(key_type);
        let expected = self.with_pairing(|p| {
            p.security_properties = Some(security_properties);
            p.decision.map(|d| d.authenticated)
        });
        let Some(Some(authenticated)) = expected else {
            self.fail_with_unexpected_event("on_link_key_notification");
            return;
        };

        if security_properties.level() == SecurityLevel::NoEncryption {
            warn!(
                "[bredr] Link key (type {}) for {:?} (id: {}) has insufficient security",
                key_type,
                self.handle(),
                self.peer_id
            );
            self.state.set(State::Failed);
            self.signal_status(Err(Error::InsufficientSecurity));
            return;
        }

        // An authenticated key without MITM protected association would overstate the security
        // of the link, and the reverse means the association was downgraded
        if security_properties.authenticated() != authenticated {
            warn!(
                "[bredr] Expected {} link key for {:?} (id: {}), got {}",
                if authenticated { "authenticated" } else { "unauthenticated" },
                self.handle(),
                self.peer_id,
                key_type
            );
            self.state.set(State::Failed);
            self.signal_status(Err(Error::InsufficientSecurity));
            return;
        }

        self.link.set_link_key(link_key, key_type);
        if self.with_pairing(|p| p.initiator).unwrap_or(false) {
            self.state.set(State::InitiatorWaitAuthComplete);
        } else {
            self.enable_encryption();
        }
    }

    fn on_authentication_complete(&self, status: Status) {
        if !matches!(
            self.state.get(),
            State::InitiatorPairingStarted | State::InitiatorWaitAuthComplete
        ) {
            self.fail_with_unexpected_event("on_authentication_complete");
            return;
        }
        debug_assert!(self.with_pairing(|p| p.initiator).unwrap_or(false));

        if let Err(error) = status.to_result() {
            info!(
                "[bredr] Authentication failed on link {:?} (id: {}): {:?}",
                self.handle(),
                self.peer_id,
                error
            );
            self.state.set(State::Failed);
            self.signal_status(Err(Error::Hci(error)));
            return;
        }

        self.enable_encryption();
    }

    fn on_encryption_change(&self, status: Status, enabled: bool) {
        if self.state.get() != State::WaitEncryption {
            // The peer may toggle encryption at any time ([Vol 2] Part F, Section 4.4)
            info!(
                "[bredr] {:?} (id: {}): ignoring encryption change ({:?}, {}) in state {}",
                self.handle(),
                self.peer_id,
                status,
                enabled,
                self.state.get()
            );
            return;
        }

        let mut result = Error::from_status(status);
        if result.is_ok() && !enabled {
            // With Secure Connections encryption is never disabled ([Vol 4] Part E, Section 7.1.16)
            warn!(
                "[bredr] Pairing failed due to encryption disable on link {:?} (id: {})",
                self.handle(),
                self.peer_id
            );
            result = Err(Error::Failed);
        }

        self.state.set(if result.is_ok() { State::Idle } else { State::Failed });
        self.signal_status(result);
    }

    fn enable_encryption(&self) {
        // The link may report the encryption change before returning
        self.state.set(State::WaitEncryption);
        if let Err(e) = self.link.start_encryption() {
            error!(
                "[bredr] {:?} (id: {}): failed to enable encryption: {:?}",
                self.handle(),
                self.peer_id,
                e
            );
            self.state.set(State::Failed);
            self.signal_status(Err(Error::Failed));
        }
    }

    fn fail_with_unexpected_event(&self, handler_name: &str) {
        error!(
            "[bredr] {:?} (id: {}): unexpected event {} in state {}",
            self.handle(),
            self.peer_id,
            handler_name,
            self.state.get()
        );
        self.state.set(State::Failed);
        self.signal_status(Err(Error::NotSupported));
    }

    fn fail_without_delegate(&self, handler_name: &str) {
        error!(
            "[bredr] {:?} (id: {}): no pairing delegate to handle {}",
            self.handle(),
            self.peer_id,
            handler_name
        );
        self.state.set(State::Failed);
        self.signal_status(Err(Error::NotReady));
    }

    fn signal_status(&self, result: Result<(), Error>) {
        trace!(
            "[bredr] Signaling pairing listeners for {:?} (id: {}) with {:?}",
            self.handle(),
            self.peer_id,
            result
        );
        // Detach everything first, the callbacks may tear down the link and this state machine
        let callbacks = self.current_pairing.take().map(Pairing::into_callbacks);
        let handle = self.handle();
        (self.status_callback)(handle, result);
        for cb in callbacks.into_iter().flatten() {
            cb(handle, result);
        }
    }
}
