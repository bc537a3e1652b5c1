use serde_json::{Map, Value as Json};

use crate::core::identity::ANONYMOUS_ID;

/// Free-form event properties.
pub type Properties = Map<String, Json>;
/// Free-form traits attached to the pseudonymous user identity.
pub type UserTraits = Map<String, Json>;
/// Free-form traits attached to a group.
pub type GroupTraits = Map<String, Json>;

/// User trait recording how the wallet was unlocked.
pub const AUTHENTICATION_TYPE_TRAIT: &str = "Authentication Type";

/// A single tracked event, built per call and handed to the sink.
///
/// Never retained: once forwarded, the only copy lives in the vendor
/// queue.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub name: String,
    pub properties: Properties,
    /// Identifier the event is attributed to. The installation identifier
    /// for identified events, [ANONYMOUS_ID] for anonymous ones.
    pub actor_id: String,
    /// Anonymization context handed to the vendor; always [ANONYMOUS_ID].
    pub anonymous_context_id: String,
    pub is_anonymous: bool,
}

impl EventRecord {
    /// An event attributed to the installation identifier.
    pub fn identified(
        name: impl Into<String>,
        properties: Properties,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            properties,
            actor_id: actor_id.into(),
            anonymous_context_id: ANONYMOUS_ID.to_owned(),
            is_anonymous: false,
        }
    }

    /// An event carrying no installation identifier at all.
    pub fn anonymous(name: impl Into<String>, properties: Properties) -> Self {
        Self {
            name: name.into(),
            properties,
            actor_id: ANONYMOUS_ID.to_owned(),
            anonymous_context_id: ANONYMOUS_ID.to_owned(),
            is_anonymous: true,
        }
    }
}

/// How the user unlocked the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationMethod {
    Biometric,
    Passcode,
    RememberMe,
    Password,
    Unknown,
}

impl AuthenticationMethod {
    /// Trait value reported to the vendor.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMethod::Biometric => "biometrics",
            AuthenticationMethod::Passcode => "device_passcode",
            AuthenticationMethod::RememberMe => "remember_me",
            AuthenticationMethod::Password => "password",
            AuthenticationMethod::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn anonymous_record_never_carries_a_real_actor() {
        let record = EventRecord::anonymous("Error Screen Viewed", Properties::new());
        assert_eq!(ANONYMOUS_ID, record.actor_id);
        assert_eq!(ANONYMOUS_ID, record.anonymous_context_id);
        assert!(record.is_anonymous);
    }

    #[test]
    fn identified_record_keeps_the_anonymization_context() {
        let record = EventRecord::identified("Wallet Opened", Properties::new(), "0xabc");
        assert_eq!("0xabc", record.actor_id);
        assert_eq!(ANONYMOUS_ID, record.anonymous_context_id);
        assert!(!record.is_anonymous);
    }
}
