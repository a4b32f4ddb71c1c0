use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub graphiql: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("ROOMCHAT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!(
                "ROOMCHAT_JWT_SECRET is unset or still a placeholder; \
                 it must match the identity provider's signing secret"
            );
        }

        let port = var("ROOMCHAT_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ROOMCHAT_PORT must be a port number")?;

        let graphiql = match var("ROOMCHAT_GRAPHIQL").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("ROOMCHAT_GRAPHIQL must be true or false, got {}", other),
        };

        Ok(Self {
            host: var("ROOMCHAT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("ROOMCHAT_DB_PATH")
                .unwrap_or_else(|| "roomchat.db".into())
                .into(),
            jwt_secret,
            jwt_issuer: var("ROOMCHAT_JWT_ISSUER").filter(|v| !v.is_empty()),
            graphiql,
        })
    }
}
