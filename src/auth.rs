//! Sign-in and bearer tokens.
//!
//! Secrets are stored as bcrypt hashes. Tokens are HS256 JWTs carrying the
//! username, issue time and expiry; verification needs only the token, the
//! signing key and the current time. There is no server-side revocation.

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::error::{AuthError, TokenRejection};
use crate::models::{Claims, IssuedToken};
use crate::storage::UserStore;

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 10 * 60;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Source of the current time for token issuance and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Checks a username/password pair against the credential store.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    // Compared against when the user does not exist, so both failure paths
    // cost one bcrypt verification.
    decoy_hash: Arc<str>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, cost: u32) -> Result<Self, AuthError> {
        let decoy_hash = hash_password(&Uuid::new_v4().to_string(), cost)?;
        Ok(Self {
            users,
            decoy_hash: decoy_hash.into(),
        })
    }

    /// Returns the authenticated username, or `AuthError::Unauthenticated` for
    /// an unknown user and a wrong password alike.
    pub async fn verify(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = self.users.find_user(username).await?;
        let known = user.is_some();
        let stored_hash = match user {
            Some(user) => user.password_hash,
            None => self.decoy_hash.to_string(),
        };

        let password = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await?
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "stored password hash is unreadable");
                false
            });

        if known && matches {
            Ok(username.to_owned())
        } else {
            tracing::debug!(username = %username, "sign-in rejected");
            Err(AuthError::Unauthenticated)
        }
    }
}

/// Issues, verifies and refreshes HS256 tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<IssuedToken, AuthError> {
        // Claims carry whole seconds; truncate so `expires_at` matches `exp`.
        let now = self.clock.now();
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: subject.to_owned(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenRejection> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenRejection::Invalid,
                _ => TokenRejection::Malformed,
            }
        })?;

        let expires_at =
            DateTime::from_timestamp(data.claims.exp, 0).ok_or(TokenRejection::Malformed)?;
        if self.clock.now() > expires_at {
            return Err(TokenRejection::Expired);
        }
        Ok(data.claims)
    }

    /// New token for the same subject. Only tokens that still verify are
    /// accepted; there is no grace period after expiry.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, AuthError> {
        let claims = self.verify(token)?;
        self.issue(&claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::storage::Storage;
    use chrono::TimeZone;

    const SECRET: &[u8] = b"test-signing-key";
    const TEST_COST: u32 = 4;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn tokens_at(secret: &[u8], at: DateTime<Utc>) -> TokenService {
        TokenService::new(secret, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
            .with_clock(Arc::new(FixedClock(at)))
    }

    async fn verifier_with_admin() -> CredentialVerifier {
        let storage = Storage::temporary("test").unwrap();
        storage
            .put_user(&User {
                username: "admin".to_string(),
                password_hash: hash_password("fCRmh4Q2J7Rseqkz", TEST_COST).unwrap(),
            })
            .await
            .unwrap();
        CredentialVerifier::new(Arc::new(storage), TEST_COST).unwrap()
    }

    #[test]
    fn test_password_hash_is_salted() {
        let first = hash_password("secret", TEST_COST).unwrap();
        let second = hash_password("secret", TEST_COST).unwrap();
        assert_ne!(first, second);
        assert_ne!(first, "secret");
        assert!(verify_password("secret", &first).unwrap());
        assert!(!verify_password("other", &first).unwrap());
    }

    #[tokio::test]
    async fn test_correct_credentials_authenticate() {
        let verifier = verifier_with_admin().await;
        let username = verifier.verify("admin", "fCRmh4Q2J7Rseqkz").await.unwrap();
        assert_eq!(username, "admin");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let verifier = verifier_with_admin().await;
        let wrong = verifier.verify("admin", "guess").await.unwrap_err();
        let unknown = verifier.verify("nobody", "fCRmh4Q2J7Rseqkz").await.unwrap_err();
        assert!(matches!(wrong, AuthError::Unauthenticated));
        assert!(matches!(unknown, AuthError::Unauthenticated));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn test_token_expires_after_validity_window() {
        let issued = tokens_at(SECRET, t0()).issue("admin").unwrap();
        assert_eq!(issued.expires_at, t0() + Duration::minutes(10));

        let ttl = Duration::seconds(DEFAULT_TOKEN_TTL_SECS);
        let at_issue = tokens_at(SECRET, t0()).verify(&issued.token).unwrap();
        assert_eq!(at_issue.sub, "admin");
        assert_eq!(at_issue.iat, t0().timestamp());

        let just_before = t0() + ttl - Duration::seconds(1);
        assert!(tokens_at(SECRET, just_before).verify(&issued.token).is_ok());

        let just_after = t0() + ttl + Duration::seconds(1);
        assert_eq!(
            tokens_at(SECRET, just_after).verify(&issued.token),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_sub_second_issue_time_reports_signed_expiry() {
        let issued_at = t0() + Duration::milliseconds(700);
        let issued = tokens_at(SECRET, issued_at).issue("admin").unwrap();
        let claims = tokens_at(SECRET, issued_at).verify(&issued.token).unwrap();

        assert_eq!(issued.expires_at.timestamp_subsec_nanos(), 0);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
        assert_eq!(issued.expires_at, t0() + Duration::minutes(10));

        assert!(tokens_at(SECRET, issued.expires_at).verify(&issued.token).is_ok());
        let past_reported = issued.expires_at + Duration::milliseconds(500);
        assert_eq!(
            tokens_at(SECRET, past_reported).verify(&issued.token),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_token_from_other_key_is_invalid() {
        let issued = tokens_at(b"key-one", t0()).issue("admin").unwrap();
        assert_eq!(
            tokens_at(b"key-two", t0()).verify(&issued.token),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let tokens = tokens_at(SECRET, t0());
        assert_eq!(tokens.verify("not-a-token"), Err(TokenRejection::Malformed));
        assert_eq!(tokens.verify(""), Err(TokenRejection::Malformed));
    }

    #[test]
    fn test_refresh_extends_expiry_for_same_subject() {
        let issued = tokens_at(SECRET, t0()).issue("admin").unwrap();
        let later = t0() + Duration::minutes(5);
        let refreshed = tokens_at(SECRET, later).refresh(&issued.token).unwrap();

        assert_eq!(refreshed.expires_at, later + Duration::minutes(10));
        let claims = tokens_at(SECRET, later).verify(&refreshed.token).unwrap();
        assert_eq!(claims.sub, "admin");
    }

    #[test]
    fn test_refresh_rejects_expired_token() {
        let issued = tokens_at(SECRET, t0()).issue("admin").unwrap();
        let expired = t0() + Duration::minutes(11);
        let result = tokens_at(SECRET, expired).refresh(&issued.token);
        assert!(matches!(
            result,
            Err(AuthError::Rejected(TokenRejection::Expired))
        ));
    }
}
