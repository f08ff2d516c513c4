//! Await the outcome of a pairing from async code.
use alloc::boxed::Box;
use alloc::rc::Rc;

use bt_hci::param::ConnHandle;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

use crate::pairing::StatusCallback;
use crate::Error;

/// Turns a pairing status callback into a future.
///
/// ```ignore
/// let waiter = PairingWaiter::new();
/// if pairing.initiate_pairing(waiter.callback()) == InitiatorAction::SendAuthenticationRequest {
///     controller.exec(&AuthenticationRequested::new(handle)).await?;
/// }
/// let (handle, result) = waiter.wait().await;
/// ```
pub struct PairingWaiter {
    signal: Rc<Signal<NoopRawMutex, (ConnHandle, Result<(), Error>)>>,
}

impl PairingWaiter {
    /// Create a waiter with no outcome yet.
    pub fn new() -> Self {
        Self {
            signal: Rc::new(Signal::new()),
        }
    }

    /// Status callback that completes this waiter.
    pub fn callback(&self) -> StatusCallback {
        let signal = self.signal.clone();
        Box::new(move |handle, result| signal.signal((handle, result)))
    }

    /// Wait for the pairing outcome.
    pub async fn wait(&self) -> (ConnHandle, Result<(), Error>) {
        self.signal.wait().await
    }

    /// Whether the pairing already ended.
    pub fn is_signaled(&self) -> bool {
        self.signal.signaled()
    }
}

impl Default for PairingWaiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn callback_completes_wait() {
        let waiter = PairingWaiter::new();
        assert!(!waiter.is_signaled());

        let cb = waiter.callback();
        cb(ConnHandle::new(1), Err(Error::Canceled));
        assert!(waiter.is_signaled());
        let (handle, result) = block_on(waiter.wait());
        assert_eq!(handle, ConnHandle::new(1));
        assert_eq!(result, Err(Error::Canceled));
    }

    #[test]
    fn outlives_callback() {
        let waiter = PairingWaiter::default();
        let cb = waiter.callback();
        drop(waiter);
        cb(ConnHandle::new(2), Ok(()));
    }
}
