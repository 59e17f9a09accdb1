//! Unverified JWT payload decoding.
//!
//! Tokens come straight from the token endpoint over TLS; signatures are not
//! checked here. Claims are only used to describe the signed-in user.

use crate::{AuthError, AuthResult};
use akv_storage::UserInfo;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Decode the payload segment of a compact JWT into its claims object.
pub fn decode_claims(token: &str) -> AuthResult<Map<String, Value>> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken("expected three dot-separated segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(claims) => Ok(claims),
        _ => Err(AuthError::InvalidToken("payload is not a JSON object".into())),
    }
}

fn claim_str<'a>(claims: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| claims.get(*name).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

/// Build a [`UserInfo`] from Entra ID claims (`oid`/`sub`,
/// `preferred_username`/`email`/`upn`, `name`, `tid`, `roles`).
pub fn user_from_claims(claims: &Map<String, Value>, now: DateTime<Utc>) -> AuthResult<UserInfo> {
    let id = claim_str(claims, &["oid", "sub"])
        .ok_or_else(|| AuthError::InvalidToken("token has no oid or sub claim".into()))?;
    let email = claim_str(claims, &["preferred_username", "email", "upn", "unique_name"])
        .unwrap_or_default();
    let name = claim_str(claims, &["name"]).unwrap_or(email);

    let roles = claims
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(UserInfo {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        tenant_id: claim_str(claims, &["tid"]).map(str::to_string),
        roles,
        last_login: now,
    })
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
