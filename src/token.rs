// In-memory bearer token
//
// The token is never written to disk. It is filled by the first call that
// finds it invalid and reused until it expires.

use std::fmt;

use serde::Deserialize;

/// Body returned by `POST <base>/token`.
#[derive(Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Current bearer token and its expiry anchor.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    issued_at: Option<u64>,
}

impl Token {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token is valid when every field is set and `now` is before
    /// `issued_at + expires_in`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        match (&self.access_token, &self.token_type, self.expires_at()) {
            (Some(_), Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }

    pub fn expires_at(&self) -> Option<u64> {
        Some(self.issued_at?.saturating_add(self.expires_in?))
    }

    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    /// Replace the token with a fresh grant issued at `issued_at`.
    pub fn store(&mut self, grant: TokenGrant, issued_at: u64) {
        self.access_token = Some(grant.access_token);
        self.token_type = Some(grant.token_type);
        self.expires_in = Some(grant.expires_in);
        self.issued_at = Some(issued_at);
    }

    /// Value for the `Authorization` header, e.g. `Bearer abc`.
    pub fn authorization(&self) -> Option<String> {
        match (&self.token_type, &self.access_token) {
            (Some(kind), Some(token)) => Some(format!("{} {}", kind, token)),
            _ => None,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
