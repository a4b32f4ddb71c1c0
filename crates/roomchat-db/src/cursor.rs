//! Pagination tokens. A token is the last evaluated key of a page, tagged with
//! the table or index it came from and encoded as URL-safe base64 JSON.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::{Deserialize, Serialize};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastKey {
    #[serde(rename = "src")]
    pub source: String,
    /// Partition value, for index queries.
    #[serde(rename = "pk", default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

pub fn encode(key: &LastKey) -> Result<String, StoreError> {
    let json = serde_json::to_vec(key)?;
    Ok(B64.encode(json))
}

/// Decodes `token` and checks that it was issued for `source`.
pub fn decode(token: &str, source: &str) -> Result<LastKey, StoreError> {
    let invalid = || StoreError::Validation(format!("Invalid nextToken for {}", source));

    let bytes = B64.decode(token).map_err(|_| invalid())?;
    let key: LastKey = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
    if key.source != source {
        return Err(invalid());
    }
    Ok(key)
}
