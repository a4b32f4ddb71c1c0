use std::sync::Arc;

use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, Validation, decode};

use roomchat_db::Database;
use roomchat_types::api::{Claims, Identity};

use crate::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt: JwtSettings,
    pub dispatcher: Dispatcher,
}

/// Verification settings for tokens minted by the identity provider.
pub struct JwtSettings {
    pub secret: String,
    pub issuer: Option<String>,
}

impl JwtSettings {
    /// Validates signature, expiry and (when configured) issuer, then turns
    /// the claims into the caller identity.
    pub fn verify(&self, token: &str) -> Result<Identity, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;

        Ok(token_data.claims.into())
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
