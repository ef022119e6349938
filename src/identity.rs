use serde::{Deserialize, Serialize};

/// Reserved identifier marking the signed-out state.
///
/// An [`Identity`] id is always present: either a real provider-assigned
/// value or this marker, never an empty string.
pub const UNAVAILABLE_ID: &str = "unavailable";

/// The signed-in principal as seen by the application.
///
/// Absence of a signed-in user is represented by the empty identity
/// ([`Identity::empty`]) rather than an `Option`, so that every cache read
/// and stream element carries a well-formed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned stable identifier, or [`UNAVAILABLE_ID`].
    pub id: String,
    /// Display name, if the provider has one on record.
    pub name: Option<String>,
    /// Email address, if the provider has one on record.
    pub email: Option<String>,
    /// Phone number in E.164 form, if the provider has one on record.
    pub phone_number: Option<String>,
}

impl Identity {
    /// The distinguished "signed out" identity.
    pub fn empty() -> Self {
        Self {
            id: UNAVAILABLE_ID.to_string(),
            name: None,
            email: None,
            phone_number: None,
        }
    }

    /// True when this is the signed-out sentinel.
    pub fn is_empty(&self) -> bool {
        self.id == UNAVAILABLE_ID
    }
}

/// Raw identity record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl From<ProviderIdentity> for Identity {
    fn from(raw: ProviderIdentity) -> Self {
        Self {
            id: raw.uid,
            name: raw.display_name,
            email: raw.email,
            phone_number: raw.phone_number,
        }
    }
}
