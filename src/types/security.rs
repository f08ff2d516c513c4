use core::fmt::{Display, Formatter};

use crate::Error;

/// Type of a BR/EDR link key as reported by the controller
// ([Vol 4] Part E, Section 7.7.24).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKeyType {
    /// Legacy combination key
    Combination,
    /// Legacy local unit key
    LocalUnit,
    /// Legacy remote unit key
    RemoteUnit,
    /// Debug combination key, derived from the well known debug key pair
    DebugCombination,
    /// Unauthenticated combination key generated from P-192
    UnauthenticatedCombination192,
    /// Authenticated combination key generated from P-192
    AuthenticatedCombination192,
    /// Changed combination key
    ChangedCombination,
    /// Unauthenticated combination key generated from P-256
    UnauthenticatedCombination256,
    /// Authenticated combination key generated from P-256
    AuthenticatedCombination256,
}

impl TryFrom<u8> for LinkKeyType {
    type Error = Error;
    fn try_from(val: u8) -> Result<Self, Error> {
        Ok(match val {
            0x00 => Self::Combination,
            0x01 => Self::LocalUnit,
            0x02 => Self::RemoteUnit,
            0x03 => Self::DebugCombination,
            0x04 => Self::UnauthenticatedCombination192,
            0x05 => Self::AuthenticatedCombination192,
            0x06 => Self::ChangedCombination,
            0x07 => Self::UnauthenticatedCombination256,
            0x08 => Self::AuthenticatedCombination256,
            _ => return Err(Error::InvalidValue),
        })
    }
}

impl From<LinkKeyType> for u8 {
    fn from(val: LinkKeyType) -> u8 {
        match val {
            LinkKeyType::Combination => 0x00,
            LinkKeyType::LocalUnit => 0x01,
            LinkKeyType::RemoteUnit => 0x02,
            LinkKeyType::DebugCombination => 0x03,
            LinkKeyType::UnauthenticatedCombination192 => 0x04,
            LinkKeyType::AuthenticatedCombination192 => 0x05,
            LinkKeyType::ChangedCombination => 0x06,
            LinkKeyType::UnauthenticatedCombination256 => 0x07,
            LinkKeyType::AuthenticatedCombination256 => 0x08,
        }
    }
}

impl Display for LinkKeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkKeyType {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", u8::from(*self))
    }
}

/// BR/EDR link key
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[must_use]
#[repr(transparent)]
pub struct LinkKey(pub u128);

impl Display for LinkKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkKey {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:032x}", self.0)
    }
}

/// Security level of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityLevel {
    /// No encryption and no authentication. Keys from legacy pairing land here.
    NoEncryption,
    /// Encrypted without MITM protection.
    Encrypted,
    /// Encrypted and authenticated.
    EncryptedAuthenticated,
}

/// Security properties of a link key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityProperties {
    level: SecurityLevel,
    authenticated: bool,
    secure_connections: bool,
}

impl SecurityProperties {
    /// Security level granted by the key.
    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Whether the key resulted from an association model with MITM protection.
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the key was generated with Secure Connections (P-256).
    pub fn secure_connections(&self) -> bool {
        self.secure_connections
    }
}

impl From<LinkKeyType> for SecurityProperties {
    fn from(key_type: LinkKeyType) -> Self {
        let (level, authenticated, secure_connections) = match key_type {
            LinkKeyType::UnauthenticatedCombination192 => (SecurityLevel::Encrypted, false, false),
            LinkKeyType::AuthenticatedCombination192 => (SecurityLevel::EncryptedAuthenticated, true, false),
            LinkKeyType::UnauthenticatedCombination256 => (SecurityLevel::Encrypted, false, true),
            LinkKeyType::AuthenticatedCombination256 => (SecurityLevel::EncryptedAuthenticated, true, true),
            // Legacy and debug keys offer no usable security, and a changed key carries no
            // information about how it was created.
            LinkKeyType::Combination
            | LinkKeyType::LocalUnit
            | LinkKeyType::RemoteUnit
            | LinkKeyType::DebugCombination
            | LinkKeyType::ChangedCombination => (SecurityLevel::NoEncryption, false, false),
        };
        Self {
            level,
            authenticated,
            secure_connections,
        }
    }
}

/// Authentication requirements advertised in the IO capability exchange
// ([Vol 4] Part E, Section 7.1.29).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuthRequirements {
    /// No bonding, no MITM protection
    NoBonding,
    /// No bonding, MITM protection required
    MitmNoBonding,
    /// Dedicated bonding, no MITM protection
    DedicatedBonding,
    /// Dedicated bonding, MITM protection required
    MitmDedicatedBonding,
    /// General bonding, no MITM protection
    GeneralBonding,
    /// General bonding, MITM protection required
    MitmGeneralBonding,
}

impl AuthRequirements {
    /// Whether MITM protection is requested.
    pub fn man_in_the_middle(&self) -> bool {
        matches!(
            self,
            AuthRequirements::MitmNoBonding
                | AuthRequirements::MitmDedicatedBonding
                | AuthRequirements::MitmGeneralBonding
        )
    }
}

impl TryFrom<u8> for AuthRequirements {
    type Error = Error;
    fn try_from(val: u8) -> Result<Self, Error> {
        Ok(match val {
            0x00 => Self::NoBonding,
            0x01 => Self::MitmNoBonding,
            0x02 => Self::DedicatedBonding,
            0x03 => Self::MitmDedicatedBonding,
            0x04 => Self::GeneralBonding,
            0x05 => Self::MitmGeneralBonding,
            _ => return Err(Error::InvalidValue),
        })
    }
}

impl From<AuthRequirements> for u8 {
    fn from(val: AuthRequirements) -> u8 {
        match val {
            AuthRequirements::NoBonding => 0x00,
            AuthRequirements::MitmNoBonding => 0x01,
            AuthRequirements::DedicatedBonding => 0x02,
            AuthRequirements::MitmDedicatedBonding => 0x03,
            AuthRequirements::GeneralBonding => 0x04,
            AuthRequirements::MitmGeneralBonding => 0x05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_type_security_properties() {
        let props = SecurityProperties::from(LinkKeyType::AuthenticatedCombination256);
        assert_eq!(props.level(), SecurityLevel::EncryptedAuthenticated);
        assert!(props.authenticated());
        assert!(props.secure_connections());

        let props = SecurityProperties::from(LinkKeyType::UnauthenticatedCombination192);
        assert_eq!(props.level(), SecurityLevel::Encrypted);
        assert!(!props.authenticated());
        assert!(!props.secure_connections());

        for legacy in [
            LinkKeyType::Combination,
            LinkKeyType::LocalUnit,
            LinkKeyType::RemoteUnit,
            LinkKeyType::DebugCombination,
        ] {
            assert_eq!(SecurityProperties::from(legacy).level(), SecurityLevel::NoEncryption);
        }
    }

    #[test]
    fn decode_link_key_type() {
        assert_eq!(LinkKeyType::try_from(0x03), Ok(LinkKeyType::DebugCombination));
        assert_eq!(LinkKeyType::try_from(0x08), Ok(LinkKeyType::AuthenticatedCombination256));
        assert_eq!(LinkKeyType::try_from(0x09), Err(Error::InvalidValue));
    }

    #[test]
    fn mitm_flag() {
        assert!(AuthRequirements::MitmGeneralBonding.man_in_the_middle());
        assert!(!AuthRequirements::GeneralBonding.man_in_the_middle());
        assert_eq!(AuthRequirements::try_from(0x05), Ok(AuthRequirements::MitmGeneralBonding));
    }
}
