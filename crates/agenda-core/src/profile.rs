//! Signed-in user profile.

use serde::{Deserialize, Serialize};

/// Display details of the signed-in user.
///
/// Persisted as a JSON blob next to the bearer token. Both the sign-in SDK
/// field names (`photo`, `givenName`) and the OpenID userinfo names
/// (`picture`, `given_name`, `sub`) are accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Stable account identifier.
    #[serde(default, alias = "sub", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Full display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Account email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default, rename = "photo", alias = "picture", alias = "photoUrl")]
    pub photo_url: Option<String>,
    #[serde(default, alias = "given_name", skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, alias = "family_name", skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl UserProfile {
    /// Creates a profile with a name and email.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            ..Default::default()
        }
    }

    /// Returns the best label for display: name, then email, then `"Unknown user"`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Unknown user")
    }
}
