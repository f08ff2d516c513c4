//! Compile-time configuration.
//!
//! `trouble-bredr` has some configuration settings that are set at compile time.
//!
//! They are set through environment variables at build time: set the variable named
//! `TROUBLE_BREDR_<value>`. For example `TROUBLE_BREDR_PAIRING_WAITERS=8 cargo build`. You can
//! also set them in the `[env]` section of `.cargo/config.toml`.

mod raw {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// Pairing waiters
///
/// Number of initiator completion callbacks a single in-flight pairing can hold. Requests beyond
/// this are answered immediately with [`Error::OutOfMemory`](crate::Error::OutOfMemory).
///
/// Default: 4.
pub const PAIRING_WAITERS: usize = raw::PAIRING_WAITERS;
