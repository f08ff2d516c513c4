//! The ACL link a pairing runs on.
use alloc::boxed::Box;
use alloc::rc::Rc;

use bt_hci::param::{ConnHandle, Status};

use crate::{Error, LinkKey, LinkKeyType};

/// Called with the status and new state every time encryption of the link changes.
pub type EncryptionChangeCallback = Box<dyn FnMut(Status, bool)>;

/// Operations the pairing state machine needs from the underlying BR/EDR connection.
pub trait Link {
    /// Connection handle of the link.
    fn handle(&self) -> ConnHandle;

    /// Link key currently in use, if any.
    fn link_key(&self) -> Option<LinkKey>;

    /// Store a newly negotiated link key.
    fn set_link_key(&self, key: LinkKey, key_type: LinkKeyType);

    /// Ask the controller to start encryption. An error means the request could not be issued.
    fn start_encryption(&self) -> Result<(), Error>;

    /// Install or remove the single encryption change callback of the link.
    fn set_encryption_change_callback(&self, callback: Option<EncryptionChangeCallback>);
}

/// Encryption change callback installed on a [`Link`].
///
/// The callback stays installed for the lifetime of the hook and is removed exactly once, either by
/// [`EncryptionChangeHook::release`] or when the hook is dropped.
pub struct EncryptionChangeHook<L: Link> {
    link: Option<Rc<L>>,
}

impl<L: Link> EncryptionChangeHook<L> {
    /// Install `callback` on `link`.
    pub fn install(link: Rc<L>, callback: EncryptionChangeCallback) -> Self {
        link.set_encryption_change_callback(Some(callback));
        Self { link: Some(link) }
    }

    /// Remove the callback from the link. Subsequent calls do nothing.
    pub fn release(&mut self) {
        if let Some(link) = self.link.take() {
            link.set_encryption_change_callback(None);
        }
    }
}

impl<L: Link> Drop for EncryptionChangeHook<L> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use core::cell::{Cell, RefCell};

    use super::*;

    #[derive(Default)]
    struct CountingLink {
        callback: RefCell<Option<EncryptionChangeCallback>>,
        removals: Cell<usize>,
    }

    impl Link for CountingLink {
        fn handle(&self) -> ConnHandle {
            ConnHandle::new(1)
        }

        fn link_key(&self) -> Option<LinkKey> {
            None
        }

        fn set_link_key(&self, _key: LinkKey, _key_type: LinkKeyType) {}

        fn start_encryption(&self) -> Result<(), Error> {
            Ok(())
        }

        fn set_encryption_change_callback(&self, callback: Option<EncryptionChangeCallback>) {
            if callback.is_none() {
                self.removals.set(self.removals.get() + 1);
            }
            self.callback.replace(callback);
        }
    }

    #[test]
    fn hook_is_removed_once() {
        let link = Rc::new(CountingLink::default());
        let mut hook = EncryptionChangeHook::install(link.clone(), Box::new(|_, _| {}));
        assert!(link.callback.borrow().is_some());

        hook.release();
        assert!(link.callback.borrow().is_none());
        hook.release();
        drop(hook);

        assert!(link.callback.borrow().is_none());
        assert_eq!(link.removals.get(), 1);
    }

    #[test]
    fn hook_is_removed_on_drop() {
        let link = Rc::new(CountingLink::default());
        {
            let _hook = EncryptionChangeHook::install(link.clone(), Box::new(|_, _| {}));
        }
        assert!(link.callback.borrow().is_none());
        assert_eq!(link.removals.get(), 1);
    }
}
