#![no_std]
#![warn(missing_docs)]
//! # BR/EDR pairing for trouble
//!
//! Orchestrates Secure Simple Pairing and link encryption setup on a classic Bluetooth
//! connection. One [`PairingState`] lives alongside each ACL link: it consumes the controller
//! events of the pairing procedure, consults a [`PairingDelegate`] for user interaction, checks the
//! resulting link key and finally enables encryption.

extern crate alloc;

use bt_hci::param::Status;

mod fmt;

pub mod config;
pub mod delegate;
pub mod link;
pub mod pairing;
pub mod types;
pub mod waiter;

pub use delegate::{DisplayMethod, PairingDelegate};
pub use link::{EncryptionChangeHook, Link};
pub use pairing::{InitiatorAction, PairingState, State};
pub use types::capabilities::{IoCapabilities, IoCapability};
pub use types::security::{AuthRequirements, LinkKey, LinkKeyType, SecurityLevel, SecurityProperties};
pub use waiter::PairingWaiter;

/// Opaque identifier of a peer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u64);

impl core::fmt::Display for PeerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PeerId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:016x}", self.0)
    }
}

/// Errors reported as the outcome of a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No pairing delegate is available to cooperate in the pairing.
    NotReady,
    /// The pairing request was canceled because the link is in a failed pairing state.
    Canceled,
    /// An event arrived that cannot be handled in the current state.
    NotSupported,
    /// The link key does not meet the expected security properties.
    InsufficientSecurity,
    /// Pairing or encryption failed.
    Failed,
    /// Not enough room to track another waiter.
    OutOfMemory,
    /// A value could not be decoded.
    InvalidValue,
    /// The controller reported an error status.
    Hci(bt_hci::param::Error),
}

impl From<bt_hci::param::Error> for Error {
    fn from(error: bt_hci::param::Error) -> Self {
        Self::Hci(error)
    }
}

impl Error {
    /// Convert a controller status into a pairing outcome.
    pub fn from_status(status: Status) -> Result<(), Error> {
        status.to_result().map_err(Error::from)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotReady => write!(f, "Not ready"),
            Error::Canceled => write!(f, "Canceled"),
            Error::NotSupported => write!(f, "Not supported"),
            Error::InsufficientSecurity => write!(f, "Insufficient security"),
            Error::Failed => write!(f, "Failed"),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidValue => write!(f, "Invalid value"),
            Error::Hci(e) => write!(f, "HCI error {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::NotReady => defmt::write!(fmt, "NotReady"),
            Error::Canceled => defmt::write!(fmt, "Canceled"),
            Error::NotSupported => defmt::write!(fmt, "NotSupported"),
            Error::InsufficientSecurity => defmt::write!(fmt, "InsufficientSecurity"),
            Error::Failed => defmt::write!(fmt, "Failed"),
            Error::OutOfMemory => defmt::write!(fmt, "OutOfMemory"),
            Error::InvalidValue => defmt::write!(fmt, "InvalidValue"),
            Error::Hci(e) => defmt::write!(fmt, "Hci({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_outcome() {
        assert_eq!(Error::from_status(Status::SUCCESS), Ok(()));
        let status = Status::new(0x05);
        let error = status.to_result().unwrap_err();
        assert_eq!(Error::from_status(status), Err(Error::Hci(error)));
        assert_eq!(Error::from(error), Error::Hci(error));
    }
}
