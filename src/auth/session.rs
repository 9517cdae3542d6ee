//! Browser session carried in an encrypted `sid` cookie.
//!
//! The interactive login that creates a session lives elsewhere; this service
//! reads the cookie to authorize code and CLI-token minting.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tower_cookies::{cookie::SameSite, Cookie, Cookies, Key};

pub const SESSION_COOKIE: &str = "sid";
pub const SESSION_TTL: Duration = Duration::days(7);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    /// Unix seconds. Sessions without it live as long as the cookie.
    pub exp: Option<i64>,
}

impl Session {
    fn is_live_at(&self, now_unix: i64) -> bool {
        self.exp.map_or(true, |exp| now_unix <= exp)
    }
}

pub fn get_session(cookies: &Cookies, key: &Key) -> Option<Session> {
    let c = cookies.private(key).get(SESSION_COOKIE)?;
    let session: Session = match serde_json::from_str(c.value()) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "undecodable session payload");
            return None;
        }
    };
    session
        .is_live_at(OffsetDateTime::now_utc().unix_timestamp())
        .then_some(session)
}

/// Writes the session cookie. `secure` follows the scheme of the public URL.
pub fn set_session(cookies: &Cookies, key: &Key, user_id: &str, email: &str, ttl: Duration, secure: bool) -> anyhow::Result<()> {
    let session = Session {
        user_id: user_id.to_string(),
        email: email.to_string(),
        exp: Some((OffsetDateTime::now_utc() + ttl).unix_timestamp()),
    };
    let payload = serde_json::to_string(&session)?;
    let cookie = Cookie::build((SESSION_COOKIE, payload))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(ttl)
        .build();
    cookies.private(key).add(cookie);
    Ok(())
}

pub fn clear_session(cookies: &Cookies, key: &Key) {
    cookies.private(key).remove(Cookie::build(SESSION_COOKIE).path("/").build());
}
