use crate::Error;

/// Device I/O capabilities as reported by a pairing delegate
// ([Vol 3] Part H, Section 2.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapabilities {
    /// Display only
    DisplayOnly,
    /// Yes/no display
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input and no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl AsRef<str> for IoCapabilities {
    fn as_ref(&self) -> &str {
        match self {
            IoCapabilities::DisplayOnly => "Display Only",
            IoCapabilities::DisplayYesNo => "Display Yes/No",
            IoCapabilities::KeyboardOnly => "Keyboard Only",
            IoCapabilities::NoInputNoOutput => "No Input / No Output",
            IoCapabilities::KeyboardDisplay => "Keyboard and Display",
        }
    }
}

impl core::fmt::Display for IoCapabilities {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IoCapabilities {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.as_ref())
    }
}

/// I/O capability exchanged over HCI during Secure Simple Pairing
// ([Vol 4] Part E, Section 7.1.29).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    /// Display only
    DisplayOnly,
    /// Display with yes/no input
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input and no output
    NoInputNoOutput,
}

impl From<IoCapabilities> for IoCapability {
    fn from(val: IoCapabilities) -> IoCapability {
        match val {
            IoCapabilities::DisplayOnly => IoCapability::DisplayOnly,
            // BR/EDR has no keyboard + display capability, the closest is numeric comparison
            IoCapabilities::DisplayYesNo | IoCapabilities::KeyboardDisplay => IoCapability::DisplayYesNo,
            IoCapabilities::KeyboardOnly => IoCapability::KeyboardOnly,
            IoCapabilities::NoInputNoOutput => IoCapability::NoInputNoOutput,
        }
    }
}

impl TryFrom<u8> for IoCapability {
    type Error = Error;
    fn try_from(val: u8) -> Result<Self, Error> {
        Ok(match val {
            0x00 => Self::DisplayOnly,
            0x01 => Self::DisplayYesNo,
            0x02 => Self::KeyboardOnly,
            0x03 => Self::NoInputNoOutput,
            _ => return Err(Error::InvalidValue),
        })
    }
}

impl From<IoCapability> for u8 {
    fn from(val: IoCapability) -> u8 {
        match val {
            IoCapability::DisplayOnly => 0x00,
            IoCapability::DisplayYesNo => 0x01,
            IoCapability::KeyboardOnly => 0x02,
            IoCapability::NoInputNoOutput => 0x03,
        }
    }
}

impl AsRef<str> for IoCapability {
    fn as_ref(&self) -> &str {
        match self {
            IoCapability::DisplayOnly => "DisplayOnly",
            IoCapability::DisplayYesNo => "DisplayYesNo",
            IoCapability::KeyboardOnly => "KeyboardOnly",
            IoCapability::NoInputNoOutput => "NoInputNoOutput",
        }
    }
}

impl core::fmt::Display for IoCapability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IoCapability {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_display_is_display_yes_no_on_the_wire() {
        assert_eq!(
            IoCapability::from(IoCapabilities::KeyboardDisplay),
            IoCapability::DisplayYesNo
        );
        assert_eq!(u8::from(IoCapability::from(IoCapabilities::KeyboardDisplay)), 0x01);
    }

    #[test]
    fn reject_unknown_capability() {
        assert_eq!(IoCapability::try_from(0x03), Ok(IoCapability::NoInputNoOutput));
        assert_eq!(IoCapability::try_from(0x04), Err(Error::InvalidValue));
    }
}
