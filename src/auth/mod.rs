pub mod token;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::{HeaderMap, header, request::Parts},
    response::IntoResponse,
    routing::{get, post},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, convert::Infallible};

use crate::{
    error::AppError,
    state::{AppState, AuthConfig},
};

/// Admin session cookie name.
pub const SESSION_COOKIE: &str = "admin_session";

/// Characters escaped in the cookie value. Tokens only ever contain
/// base64, `.` and hex, so this mostly affects `=`, `+` and `/`.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/login", post(post_login))
        .route("/api/admin/logout", post(post_logout))
        .route("/api/admin/me", get(get_me))
}

// ── Session gate ──────────────────────────────────────────────────────────────

/// Whether the request carries a valid admin cookie. Never rejects.
pub struct AdminSession(pub bool);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = cookie_header(&parts.headers);
        Ok(AdminSession(authenticate(header.as_deref(), &state.auth.secret)))
    }
}

/// Classify a raw `Cookie` header as admin or not.
pub fn authenticate(cookie_header: Option<&str>, secret: &[u8]) -> bool {
    let Some(raw) = cookie_header else {
        return false;
    };
    match parse_cookies(raw).get(SESSION_COOKIE) {
        Some(value) => token::verify(value, secret),
        None => false,
    }
}

/// Split a `Cookie` header into name → decoded value. Segments without `=`
/// are skipped; the first occurrence of a name wins.
pub fn parse_cookies(raw: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for part in raw.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = percent_decode_str(value)
            .decode_utf8()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.entry(name.to_string()).or_insert(value);
    }
    cookies
}

/// HTTP/2 clients may send several `Cookie` headers; join them into one.
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

// ── Login / logout ────────────────────────────────────────────────────────────

/// Check the supplied password and issue a signed admin token.
// TODO: compare the password in constant time.
pub fn login(supplied: &str, config: &AuthConfig) -> Result<String, AppError> {
    match config.password.as_deref() {
        Some(expected) if expected == supplied => {
            Ok(token::sign(token::ADMIN_PAYLOAD, &config.secret))
        }
        _ => Err(AppError::Unauthorized),
    }
}

/// `Set-Cookie` value carrying `token` for the rest of the browser session.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax",
        SESSION_COOKIE,
        utf8_percent_encode(token, COOKIE_VALUE)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session immediately.
pub fn logout_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: Option<String>,
}

async fn post_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    // An absent or unreadable body is just a missing password.
    let password = payload.ok().and_then(|Json(req)| req.password);
    let token = login(password.as_deref().unwrap_or_default(), &state.auth)
        .inspect_err(|_| tracing::warn!("Rejected admin login attempt"))?;

    tracing::info!("Admin logged in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, state.auth.cookie_secure))],
        Json(json!({ "ok": true })),
    ))
}

async fn post_logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, logout_cookie(state.auth.cookie_secure))],
        Json(json!({ "ok": true })),
    )
}

async fn get_me(AdminSession(is_admin): AdminSession) -> impl IntoResponse {
    Json(json!({ "isAdmin": is_admin }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"gate-secret";

    fn config(password: Option<&str>) -> AuthConfig {
        AuthConfig {
            password: password.map(String::from),
            secret: SECRET.to_vec(),
            cookie_secure: false,
        }
    }

    fn cookie_value(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, v)| v)
            .unwrap()
    }

    #[test]
    fn parses_and_decodes_cookie_pairs() {
        let cookies = parse_cookies("theme=dark; junk ;  name=a%20b=c;; theme=light");
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get("name").map(String::as_str), Some("a b=c"));
        assert!(!cookies.contains_key("junk"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn undecodable_value_is_kept_raw() {
        let cookies = parse_cookies("x=%FF%FE");
        assert_eq!(cookies.get("x").map(String::as_str), Some("%FF%FE"));
    }

    #[test]
    fn no_cookie_header_is_not_admin() {
        assert!(!authenticate(None, SECRET));
        assert!(!authenticate(Some(""), SECRET));
    }

    #[test]
    fn valid_cookie_among_others_is_admin() {
        let token = login("hunter2", &config(Some("hunter2"))).unwrap();
        let set_cookie = session_cookie(&token, false);
        let header = format!("tracking=abc; {}={}", SESSION_COOKIE, cookie_value(&set_cookie));
        assert!(authenticate(Some(&header), SECRET));
    }

    #[test]
    fn unencoded_token_is_also_accepted() {
        let token = token::sign(token::ADMIN_PAYLOAD, SECRET);
        let header = format!("{SESSION_COOKIE}={token}");
        assert!(authenticate(Some(&header), SECRET));
    }

    #[test]
    fn forged_cookie_is_not_admin() {
        let header = format!("{SESSION_COOKIE}=YWRtaW4%3D.deadbeef");
        assert!(!authenticate(Some(&header), SECRET));
    }

    #[test]
    fn login_rejects_wrong_or_unconfigured_password() {
        assert!(matches!(
            login("nope", &config(Some("hunter2"))),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(login("", &config(None)), Err(AppError::Unauthorized)));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("YWRtaW4=.ab", false);
        assert!(cookie.starts_with("admin_session=YWRtaW4%3D.ab;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Max-Age"));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie("t", true).ends_with("; Secure"));
    }

    #[test]
    fn logout_cookie_expires_immediately() {
        let cookie = logout_cookie(false);
        assert!(cookie.starts_with("admin_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
