//! User identity cookie middleware.
//!
//! Every request gets a [`UserId`] extension. A valid `X-UserID` cookie keeps
//! its id; otherwise a fresh id is issued and the signed token is returned in
//! `Set-Cookie`. Routes behind [`require_valid`] answer 401 when a cookie is
//! present but invalid.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Name of the identity cookie.
pub const USER_ID_COOKIE: &str = "X-UserID";

/// Owner id resolved for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

enum TokenStatus {
    Missing,
    Invalid,
    Valid(Uuid),
}

/// Resolves or issues the user id.
pub async fn layer(
    State(st): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (user_id, issued) = match token_status(&st, req.headers()) {
        TokenStatus::Valid(user_id) => (user_id, None),
        TokenStatus::Missing | TokenStatus::Invalid => {
            let user_id = Uuid::new_v4();
            let token = st.identity.issue(user_id)?;
            (user_id, Some(token))
        }
    };

    req.extensions_mut().insert(UserId(user_id));
    let mut response = next.run(req).await;

    if let Some(token) = issued {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; Max-Age={}",
            USER_ID_COOKIE,
            token,
            st.identity.ttl().num_seconds()
        );
        let value = HeaderValue::from_str(&cookie).map_err(|e| {
            AppError::internal("Failed to set identity cookie", json!({ "reason": e.to_string() }))
        })?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Rejects a present-but-invalid token with 401.
///
/// Runs inside [`layer`], which has already attached the [`UserId`].
pub async fn require_valid(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let TokenStatus::Invalid = token_status(&st, req.headers()) {
        return Err(AppError::unauthorized(
            "Invalid user token",
            json!({ "cookie": USER_ID_COOKIE }),
        ));
    }

    Ok(next.run(req).await)
}

fn token_status(st: &AppState, headers: &HeaderMap) -> TokenStatus {
    match cookie_value(headers, USER_ID_COOKIE) {
        None => TokenStatus::Missing,
        Some(token) => match st.identity.verify(token) {
            Ok(user_id) => TokenStatus::Valid(user_id),
            Err(e) => {
                debug!("Rejected identity token: {}", e);
                TokenStatus::Invalid
            }
        },
    }
}

/// Finds a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_lookup() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; X-UserID=tok.sig"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));

        assert_eq!(cookie_value(&headers, USER_ID_COOKIE), Some("tok.sig"));
        assert_eq!(cookie_value(&headers, "b"), Some("2"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_without_cookies() {
        assert_eq!(cookie_value(&HeaderMap::new(), USER_ID_COOKIE), None);
    }
}
