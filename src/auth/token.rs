use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Lifetime of tokens handed out by the code exchange.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(24);
/// Lifetime of tokens minted directly from a session for CLI use.
pub const CLI_TOKEN_TTL: Duration = Duration::days(365);

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenIdentity {
    pub user_id: String,
    pub email: String,
}

/// Mints and verifies HS256 bearer tokens from a process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "token secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            );
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn issue(&self, user_id: &str, email: &str, ttl: Duration) -> anyhow::Result<String> {
        self.issue_at(user_id, email, ttl, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: &str, email: &str, ttl: Duration, now: OffsetDateTime) -> anyhow::Result<String> {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Returns `None` for anything that is not a valid, unexpired token signed with our secret.
    pub fn verify(&self, token: &str) -> Option<TokenIdentity> {
        match decode::<AccessClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(TokenIdentity {
                user_id: data.claims.sub,
                email: data.claims.email,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "access token rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let svc = service();
        let token = svc.issue("u1", "u1@x.com", ACCESS_TOKEN_TTL).unwrap();
        assert_eq!(
            svc.verify(&token),
            Some(TokenIdentity { user_id: "u1".into(), email: "u1@x.com".into() })
        );
    }

    #[test]
    fn cli_token_verifies() {
        let svc = service();
        let token = svc.issue("u2", "u2@x.com", CLI_TOKEN_TTL).unwrap();
        assert_eq!(svc.verify(&token).map(|id| id.user_id), Some("u2".to_string()));
    }

    #[test]
    fn short_secret_rejected() {
        assert!(TokenService::new(b"too-short").is_err());
    }

    #[test]
    fn other_secret_rejected() {
        let token = service().issue("u1", "u1@x.com", ACCESS_TOKEN_TTL).unwrap();
        let other = TokenService::new(b"ffffffffffffffffffffffffffffffff").unwrap();
        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn tampered_payload_rejected() {
        let svc = service();
        let token = svc.issue("u1", "u1@x.com", ACCESS_TOKEN_TTL).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let payload = String::from_utf8(engine.decode(parts[1]).unwrap()).unwrap();
        let forged = engine.encode(payload.replace("\"u1\"", "\"u9\""));
        let token = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_eq!(svc.verify(&token), None);
    }

    #[test]
    fn flipped_byte_rejected() {
        let svc = service();
        let token = svc.issue("u1", "u1@x.com", ACCESS_TOKEN_TTL).unwrap();
        let dot = token.find('.').unwrap();
        let mut bytes = token.into_bytes();
        let i = dot + 3;
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        assert_eq!(svc.verify(&String::from_utf8(bytes).unwrap()), None);
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = svc.issue_at("u1", "u1@x.com", Duration::hours(1), issued).unwrap();
        assert_eq!(svc.verify(&token), None);
    }

    #[test]
    fn garbage_rejected() {
        assert_eq!(service().verify("not-a-token"), None);
        assert_eq!(service().verify(""), None);
    }
}
