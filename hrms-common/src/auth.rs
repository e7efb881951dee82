//! Password hashing and signed session tokens
//!
//! Passwords are stored as `sha256$<rounds>$<salt>$<digest>` where salt and
//! digest are base64url. Session tokens are `<claims>.<signature>`, both
//! base64url, signed with HMAC-SHA256 over the encoded claims.

use crate::roles::Role;
use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Hash rounds applied to new passwords
pub const PASSWORD_ROUNDS: u32 = 10_000;

/// Default session lifetime
pub const SESSION_TTL_DAYS: i64 = 30;

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

fn derive_digest(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..rounds {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize()
            .into();
    }
    digest
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive_digest(password, &salt, PASSWORD_ROUNDS);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        PASSWORD_ROUNDS,
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

/// Check a password against a stored hash
///
/// Returns false for malformed stored values rather than erroring, so a
/// corrupt row behaves like a wrong password.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (URL_SAFE_NO_PAD.decode(salt), URL_SAFE_NO_PAD.decode(digest))
    else {
        return false;
    };
    if rounds == 0 {
        return false;
    }
    let actual = derive_digest(password, &salt, rounds);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

/// 6-digit numeric code for password resets (no leading zero)
pub fn generate_reset_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Random URL-safe token for email verification, onboarding and interviews
pub fn generate_url_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Random signing secret for session tokens
pub fn generate_secret() -> String {
    generate_url_token()
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// Reasons a session token is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

/// Issues and verifies HMAC-signed session tokens
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("HMAC key rejected: {}", e)))
    }

    /// Issue a token valid for `ttl` from now
    pub fn issue(&self, user_id: &str, role: Role, ttl: Duration) -> Result<String> {
        self.issue_at(user_id, role, Utc::now(), ttl)
    }

    pub fn issue_at(
        &self,
        user_id: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify signature and expiry against the current time
    pub fn verify(&self, token: &str) -> std::result::Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<SessionClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac().map_err(|_| TokenError::BadSignature)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_verifies_and_is_salted() {
        let a = hash_password("s3cret!");
        let b = hash_password("s3cret!");
        assert_ne!(a, b, "salt should differ between hashes");
        assert!(a.starts_with("sha256$10000$"));
        assert!(verify_password("s3cret!", &a));
        assert!(verify_password("s3cret!", &b));
        assert!(!verify_password("S3cret!", &a));
    }

    #[test]
    fn test_verify_rejects_malformed_hashes() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "sha256$abc$salt$digest"));
        assert!(!verify_password("x", "md5$1$c2FsdA$ZGlnZXN0"));
        assert!(!verify_password("x", "sha256$0$c2FsdA$ZGlnZXN0"));
    }

    #[test]
    fn test_reset_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_url_tokens_are_unique() {
        assert_ne!(generate_url_token(), generate_url_token());
    }

    #[test]
    fn test_token_round_trip() {
        let signer = TokenSigner::new("unit-test-secret");
        let token = signer
            .issue("user-1", Role::Manager, Duration::days(SESSION_TTL_DAYS))
            .unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_DAYS * 86_400);
    }

    #[test]
    fn test_token_rejects_other_secret() {
        let token = TokenSigner::new("a")
            .issue("user-1", Role::Admin, Duration::days(1))
            .unwrap();
        assert_eq!(
            TokenSigner::new("b").verify(&token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_token_rejects_tampered_payload() {
        let signer = TokenSigner::new("secret");
        let token = signer.issue("user-1", Role::Employee, Duration::days(1)).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = SessionClaims {
            sub: "user-1".into(),
            role: Role::Admin,
            iat: 0,
            exp: i64::MAX,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}", forged_payload, sig);
        assert_eq!(signer.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_token_expiry() {
        let signer = TokenSigner::new("secret");
        let issued = Utc::now() - Duration::days(31);
        let token = signer
            .issue_at("user-1", Role::Employee, issued, Duration::days(SESSION_TTL_DAYS))
            .unwrap();
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_malformed() {
        let signer = TokenSigner::new("secret");
        assert_eq!(signer.verify("no-dot-here"), Err(TokenError::Malformed));
        assert_eq!(signer.verify("abc.!!!"), Err(TokenError::Malformed));
    }
}
