/// Whether the user has opted in to telemetry collection.
///
/// Mutated only by an explicit user action; every identified emission is
/// gated on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Enabled,
    Disabled,
}

/// Persisted value recording an opt-in.
pub(crate) const AGREED: &str = "agreed";
/// Persisted value recording an opt-out.
pub(crate) const DENIED: &str = "denied";

impl ConsentState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ConsentState::Enabled)
    }

    /// Value written to the preference store for this state.
    pub(crate) fn as_preference(&self) -> &'static str {
        match self {
            ConsentState::Enabled => AGREED,
            ConsentState::Disabled => DENIED,
        }
    }

    /// Parse a stored preference. Anything other than an explicit opt-in,
    /// including an absent key, is treated as disabled.
    pub(crate) fn from_preference(preference: Option<&str>) -> Self {
        match preference {
            Some(AGREED) => ConsentState::Enabled,
            _ => ConsentState::Disabled,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn preference_round_trip() {
        for state in [ConsentState::Enabled, ConsentState::Disabled] {
            assert_eq!(
                state,
                ConsentState::from_preference(Some(state.as_preference()))
            );
        }
    }

    #[test]
    fn unknown_preference_is_disabled() {
        assert_eq!(ConsentState::Disabled, ConsentState::from_preference(None));
        assert_eq!(
            ConsentState::Disabled,
            ConsentState::from_preference(Some("garbage"))
        );
    }
}
