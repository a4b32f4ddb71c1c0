use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Claims carried by the bearer tokens the identity provider issues.
/// Shared by the HTTP middleware and the subscription handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

// -- Identity --

/// The authenticated caller of a single request.
///
/// Built once per request from verified claims and handed to resolvers
/// explicitly; nothing reads the caller from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub sub: String,
    pub username: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            username: claims.username,
        }
    }
}
