//! OIDC token pairs and the connection-detail map they are published in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Secret material handed to the publishing layer, keyed by detail name.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Connection-detail key holding the ID token.
pub const ID_TOKEN_KEY: &str = "IDToken";
/// Connection-detail key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh";

/// ID token and refresh token issued together by the identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub id_token: String,
    pub refresh_token: String,
}

impl TokenSet {
    pub fn new(id_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn connection_details(&self) -> ConnectionDetails {
        let mut details = ConnectionDetails::new();
        details.insert(ID_TOKEN_KEY.to_string(), self.id_token.as_bytes().to_vec());
        details.insert(
            REFRESH_TOKEN_KEY.to_string(),
            self.refresh_token.as_bytes().to_vec(),
        );
        details
    }

    /// Rebuild a token set from previously published details.
    ///
    /// Returns `None` when the ID token is absent or either value is not
    /// UTF-8. A missing refresh token yields an empty one.
    pub fn from_connection_details(details: &ConnectionDetails) -> Option<Self> {
        let id_token = String::from_utf8(details.get(ID_TOKEN_KEY)?.clone()).ok()?;
        let refresh_token = match details.get(REFRESH_TOKEN_KEY) {
            Some(raw) => String::from_utf8(raw.clone()).ok()?,
            None => String::new(),
        };
        Some(Self {
            id_token,
            refresh_token,
        })
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
