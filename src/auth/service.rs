//! Credential validation, password hashing, and session issuance.
//!
//! The service holds no shared mutable state; every operation is an
//! independent pass over the normalized field map. Bcrypt work runs on the
//! blocking pool so a burst of logins cannot stall the async workers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::body;
use super::error::AuthError;
use super::store::{StoreError, UserRecord, UserStore};
use super::token::{self, Claims};

/// Cost factor for new password hashes (bcrypt default, 12 rounds).
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Response-safe projection of a user record: everything but the hash.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: i64,
}

impl From<UserRecord> for PublicUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

/// Successful register/login outcome: sanitized user plus a signed token.
#[derive(Debug)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

/// Config-held admin identity. The plaintext password is digested at
/// construction and dropped; login compares digests in constant time.
#[derive(Clone)]
pub struct AdminCredentials {
    email: String,
    password_digest: String,
}

impl AdminCredentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_owned(),
            password_digest: sha256_hex(password),
        }
    }

    /// Exact-match check: email byte-for-byte, password via its digest.
    fn matches(&self, email: &str, password: &str) -> bool {
        self.email == email
            && constant_time_eq(
                sha256_hex(password).as_bytes(),
                self.password_digest.as_bytes(),
            )
    }
}

/// The authentication core: validates credentials, hashes passwords, and
/// issues signed session tokens.
pub struct AuthService {
    store: Arc<UserStore>,
    signing_secret: Vec<u8>,
    admin: Option<AdminCredentials>,
}

impl AuthService {
    pub fn new(
        store: Arc<UserStore>,
        signing_secret: impl Into<Vec<u8>>,
        admin: Option<AdminCredentials>,
    ) -> Self {
        Self {
            store,
            signing_secret: signing_secret.into(),
            admin,
        }
    }

    /// Register a new user and start a session.
    ///
    /// Exactly one record is created on success; none on any failure. The
    /// issued token carries the new user's id and no role.
    pub async fn register(&self, fields: &Map<String, Value>) -> Result<AuthSession, AuthError> {
        const CONTEXT: &str = "error during registration";

        let (Some(name), Some(email), Some(password)) = (
            body::str_field(fields, "name"),
            body::str_field(fields, "email"),
            body::str_field(fields, "password"),
        ) else {
            return Err(AuthError::MissingFields);
        };

        let existing = self
            .store
            .find_by_email(email)
            .map_err(|e| AuthError::fault(CONTEXT, e))?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(password.to_owned())
            .await
            .map_err(|e| AuthError::fault(CONTEXT, e))?;

        let user = match self.store.create_user(name, email, &password_hash) {
            Ok(user) => user,
            // A concurrent registration won the race past the lookup above;
            // the unique constraint is authoritative.
            Err(StoreError::DuplicateEmail) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(AuthError::fault(CONTEXT, e)),
        };

        let token = token::issue(&self.signing_secret, &Claims::for_user(&user.id))
            .map_err(|e| AuthError::fault(CONTEXT, e))?;

        Ok(AuthSession {
            user: user.into(),
            token,
        })
    }

    /// Authenticate an existing user and start a session.
    pub async fn login(&self, fields: &Map<String, Value>) -> Result<AuthSession, AuthError> {
        const CONTEXT: &str = "error during login";

        let (Some(email), Some(password)) = (
            body::str_field(fields, "email"),
            body::str_field(fields, "password"),
        ) else {
            return Err(AuthError::MissingFields);
        };

        let Some(user) = self
            .store
            .find_by_email(email)
            .map_err(|e| AuthError::fault(CONTEXT, e))?
        else {
            return Err(AuthError::UnknownUser);
        };

        let matched = verify_password(password.to_owned(), user.password_hash.clone())
            .await
            .map_err(|e| AuthError::fault(CONTEXT, e))?;
        if !matched {
            tracing::debug!(email, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let role = if user.is_admin { "admin" } else { "user" };
        let token = token::issue(&self.signing_secret, &Claims::for_session(&user.id, role))
            .map_err(|e| AuthError::fault(CONTEXT, e))?;

        Ok(AuthSession {
            user: user.into(),
            token,
        })
    }

    /// Authenticate the config-held admin identity.
    ///
    /// Returns the token only — admin is not a stored entity, so there is no
    /// user payload and the token carries the role without a subject.
    pub fn admin_login(&self, fields: &Map<String, Value>) -> Result<String, AuthError> {
        let (Some(email), Some(password)) = (
            body::str_field(fields, "email"),
            body::str_field(fields, "password"),
        ) else {
            return Err(AuthError::MissingFields);
        };

        let Some(admin) = &self.admin else {
            tracing::debug!("admin login rejected: no admin identity configured");
            return Err(AuthError::InvalidAdminCredentials);
        };

        if !admin.matches(email, password) {
            tracing::debug!("admin login rejected: credential mismatch");
            return Err(AuthError::InvalidAdminCredentials);
        }

        token::issue(&self.signing_secret, &Claims::for_admin())
            .map_err(|e| AuthError::fault("error during admin login", e))
    }
}

/// Bcrypt is deliberately slow; run it off the async worker threads.
async fn hash_password(password: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matched)
}

fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-signing-secret-32bytes";

    fn service_with_admin(admin: Option<AdminCredentials>) -> (Arc<UserStore>, AuthService) {
        let store = Arc::new(UserStore::open_in_memory().unwrap());
        let service = AuthService::new(Arc::clone(&store), SECRET, admin);
        (store, service)
    }

    fn test_service() -> (Arc<UserStore>, AuthService) {
        service_with_admin(None)
    }

    fn fields(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
            .collect()
    }

    #[tokio::test]
    async fn register_creates_user_and_issues_token() {
        let (store, service) = test_service();

        let session = service
            .register(&fields(&[
                ("name", "A"),
                ("email", "a@x.com"),
                ("password", "pw12345"),
            ]))
            .await
            .unwrap();

        assert!(!session.token.is_empty());
        assert_eq!(session.user.email, "a@x.com");
        assert!(!session.user.is_admin);

        // Registration grants an identity but no role.
        let claims = token::verify(SECRET, &session.token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some(session.user.id.as_str()));
        assert_eq!(claims.role, None);

        // The stored hash verifies the original password and is not plaintext.
        let record = store.find_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(record.password_hash, "pw12345");
        assert!(bcrypt::verify("pw12345", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn public_user_never_serializes_a_password_field() {
        let (_store, service) = test_service();

        let session = service
            .register(&fields(&[
                ("name", "A"),
                ("email", "a@x.com"),
                ("password", "pw12345"),
            ]))
            .await
            .unwrap();

        let json = serde_json::to_value(&session.user).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.get("password").is_none());
        assert!(obj.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_with_missing_fields_creates_no_record() {
        let (store, service) = test_service();

        let incomplete = [
            fields(&[("email", "a@x.com"), ("password", "pw12345")]),
            fields(&[("name", "A"), ("password", "pw12345")]),
            fields(&[("name", "A"), ("email", "a@x.com")]),
            fields(&[("name", "  "), ("email", "a@x.com"), ("password", "pw12345")]),
            Map::new(),
        ];
        for map in &incomplete {
            let err = service.register(map).await.unwrap_err();
            assert!(matches!(err, AuthError::MissingFields));
        }

        assert_eq!(store.user_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn register_twice_with_same_email_keeps_one_record() {
        let (store, service) = test_service();
        let body = fields(&[("name", "A"), ("email", "a@x.com"), ("password", "pw12345")]);

        service.register(&body).await.unwrap();
        let err = service.register(&body).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn login_with_correct_credentials_carries_user_role() {
        let (_store, service) = test_service();
        service
            .register(&fields(&[
                ("name", "A"),
                ("email", "a@x.com"),
                ("password", "pw12345"),
            ]))
            .await
            .unwrap();

        let session = service
            .login(&fields(&[("email", "a@x.com"), ("password", "pw12345")]))
            .await
            .unwrap();

        let claims = token::verify(SECRET, &session.token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some(session.user.id.as_str()));
        assert_eq!(claims.role.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn login_reflects_the_admin_flag_in_the_role() {
        let (store, service) = test_service();
        service
            .register(&fields(&[
                ("name", "Root"),
                ("email", "root@x.com"),
                ("password", "pw12345"),
            ]))
            .await
            .unwrap();
        store.set_admin("root@x.com").unwrap();

        let session = service
            .login(&fields(&[("email", "root@x.com"), ("password", "pw12345")]))
            .await
            .unwrap();

        let claims = token::verify(SECRET, &session.token).unwrap();
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert!(session.user.is_admin);
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let (_store, service) = test_service();
        service
            .register(&fields(&[
                ("name", "A"),
                ("email", "a@x.com"),
                ("password", "pw12345"),
            ]))
            .await
            .unwrap();

        let err = service
            .login(&fields(&[("email", "a@x.com"), ("password", "wrong")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_with_unknown_email_fails() {
        let (_store, service) = test_service();
        let err = service
            .login(&fields(&[("email", "ghost@x.com"), ("password", "pw12345")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn login_with_missing_fields_fails() {
        let (_store, service) = test_service();
        let err = service
            .login(&fields(&[("email", "a@x.com")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));
    }

    #[test]
    fn admin_login_requires_the_exact_pair() {
        let admin = AdminCredentials::new("admin@x.com", "s3cret-Admin");
        let (_store, service) = service_with_admin(Some(admin));

        let token = service
            .admin_login(&fields(&[
                ("email", "admin@x.com"),
                ("password", "s3cret-Admin"),
            ]))
            .unwrap();
        let claims = token::verify(SECRET, &token).unwrap();
        assert_eq!(claims.sub, None);
        assert_eq!(claims.role.as_deref(), Some("admin"));
    }

    #[test]
    fn admin_login_is_case_sensitive() {
        let admin = AdminCredentials::new("admin@x.com", "s3cret-Admin");
        let (_store, service) = service_with_admin(Some(admin));

        // Email case difference fails.
        let err = service
            .admin_login(&fields(&[
                ("email", "Admin@x.com"),
                ("password", "s3cret-Admin"),
            ]))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAdminCredentials));

        // Password case difference fails.
        let err = service
            .admin_login(&fields(&[
                ("email", "admin@x.com"),
                ("password", "s3cret-admin"),
            ]))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAdminCredentials));
    }

    #[test]
    fn admin_login_without_configured_identity_always_fails() {
        let (_store, service) = test_service();
        let err = service
            .admin_login(&fields(&[("email", "admin@x.com"), ("password", "pw")]))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAdminCredentials));
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
