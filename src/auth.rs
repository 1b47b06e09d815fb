use crate::error::ApiError;
use crate::schemas::UserId;
use crate::settings::Settings;
use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use chrono::Utc;
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::ParseIntError;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = request
            .app_data::<web::Data<Settings>>()
            .and_then(|settings| {
                check_authorization(request, &settings.auth.secret, settings.auth.token_ttl_secs)
            });
        ready(user.ok_or(ApiError::Unauthorized))
    }
}

/// Token minted by the login service and sent verbatim in `Authorization`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct AuthToken {
    user_id: UserId,
    issued_at: i64,
    hash: String,
}

pub fn check_authorization(
    request: &HttpRequest,
    secret: &str,
    token_ttl_secs: i64,
) -> Option<AuthenticatedUser> {
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    let token: AuthToken = match serde_json::from_str(authorization) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, "malformed authorization token");
            return None;
        }
    };
    let hash = token
        .hash
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()?;
    if hasher(secret, &token).verify_slice(&hash).is_err() {
        warn!(user_id = %token.user_id, "authorization token signature mismatch");
        return None;
    }
    let age = Utc::now().timestamp() - token.issued_at;
    if !(0..=token_ttl_secs).contains(&age) {
        warn!(user_id = %token.user_id, age, "authorization token expired");
        return None;
    }
    Some(AuthenticatedUser(token.user_id))
}

/// Builds the header value the login service hands out for `user_id`.
pub fn issue_token(user_id: &str, secret: &str, issued_at: i64) -> String {
    let mut token = AuthToken {
        user_id: user_id.to_owned(),
        issued_at,
        hash: String::new(),
    };
    token.hash = hasher(secret, &token)
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    // Serializing a struct of strings and integers cannot fail.
    serde_json::to_string(&token).unwrap_or_default()
}

fn hasher(secret: &str, token: &AuthToken) -> HmacSha256 {
    let hash_content = [
        ("issued_at", token.issued_at.to_string()),
        ("user_id", token.user_id.clone()),
    ]
    .iter()
    .map(|(key, val)| format!("{key}={val}"))
    .collect::<Vec<_>>()
    .join("\n");
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(secret.as_bytes());
    let secret_hash = sha256_hasher.finalize();

    let mut hmac_hasher = HmacSha256::new_from_slice(&secret_hash)
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    hmac_hasher.update(hash_content.as_bytes());
    hmac_hasher
}
