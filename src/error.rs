//! Error type shared by the timer, interrupt, external interrupt and PWM drivers

use core::fmt;

/// Reasons a driver request was (partially) rejected.
///
/// The non-strict driver entry points swallow these and leave the offending
/// register field untouched; the strict ones hand them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Clock source not available on this timer
    UnsupportedClock,
    /// Counting mode not available on this timer
    UnsupportedMode,
    /// Toggle on compare match outside normal or clear-on-compare mode
    ToggleRequiresNonPwmMode,
    /// Callback registration without a callback
    MissingCallback,
    /// Sense control not available on this external interrupt line
    UnsupportedSense,
    /// PWM requested at 0 Hz
    ZeroFrequency,
}

impl HalError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedClock => "unsupported clock source",
            Self::UnsupportedMode => "unsupported counting mode",
            Self::ToggleRequiresNonPwmMode => "toggle needs normal or CTC mode",
            Self::MissingCallback => "missing callback",
            Self::UnsupportedSense => "unsupported sense control",
            Self::ZeroFrequency => "zero PWM frequency",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ufmt::uDisplay for HalError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        f.write_str(self.as_str())
    }
}

/// Result type for driver operations
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_error_type_covers_every_driver() {
        let sense: HalResult<()> = Err(HalError::UnsupportedSense);
        let callback: HalResult<()> = Err(HalError::MissingCallback);
        assert_eq!(sense.unwrap_err().to_string(), "unsupported sense control");
        assert_eq!(callback.unwrap_err().to_string(), "missing callback");
    }

    struct Text(String);

    impl ufmt::uWrite for Text {
        type Error = core::convert::Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn udisplay_matches_display() {
        let mut out = Text(String::new());
        ufmt::uwrite!(out, "{}", HalError::ZeroFrequency).unwrap();
        assert_eq!(out.0, HalError::ZeroFrequency.to_string());
    }
}
