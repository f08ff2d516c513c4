//! Pairing-related value types.
/// Input and output capabilities of a device.
pub mod capabilities;
/// Link keys and the security they provide.
pub mod security;
