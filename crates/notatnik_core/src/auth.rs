//! crates/notatnik_core/src/auth.rs
//!
//! Registration, login and bearer-token verification.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{AuthSession, AuthUser, User, MAX_USERNAME_LEN, MIN_PASSWORD_LEN};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{CredentialHasher, PortError, TokenService, UserRepository};

/// Reported for both an unknown username and a wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<AuthSession> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ServiceError::Validation(
                "All fields are required".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(ServiceError::Validation(format!(
                "Username must be at most {MAX_USERNAME_LEN} characters long"
            )));
        }

        if self.users.user_exists(username, email).await? {
            return Err(duplicate_user());
        }

        let password_hash = self.hasher.hash_password(password)?;
        let user = self
            .users
            .create_user(username, email, &password_hash)
            .await
            .map_err(|e| match e {
                // Lost a race against a concurrent registration.
                PortError::Conflict(_) => duplicate_user(),
                other => other.into(),
            })?;

        let token = self.tokens.issue(&user)?;
        info!(user_id = user.id, username = %user.username, "registered new user");
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<AuthSession> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ServiceError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let Some(credentials) = self.users.get_credentials_by_username(username).await? else {
            warn!(username, "login rejected: unknown user");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !self
            .hasher
            .verify_password(password, &credentials.password_hash)?
        {
            warn!(username, "login rejected: wrong password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.tokens.issue(&credentials.user)?;
        info!(user_id = credentials.user.id, "user logged in");
        Ok(AuthSession {
            user: credentials.user,
            token,
        })
    }

    /// Resolves a bearer token to the identity it carries.
    pub fn verify_token(&self, token: &str) -> ServiceResult<AuthUser> {
        self.tokens
            .verify(token)
            .map_err(|_| ServiceError::Unauthorized("Invalid or expired token".to_string()))
    }

    /// The profile of the token owner, if the account still exists.
    pub async fn current_user(&self, user_id: i64) -> ServiceResult<User> {
        self.users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }
}

fn duplicate_user() -> ServiceError {
    ServiceError::Conflict("A user with this username or email already exists".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mock::MockStore;
    use crate::ports::PortResult;

    /// Reversible "hash" so tests can assert nothing is stored in plaintext.
    pub(crate) struct ReversedHasher;

    impl CredentialHasher for ReversedHasher {
        fn hash_password(&self, password: &str) -> PortResult<String> {
            Ok(format!("rev${}", password.chars().rev().collect::<String>()))
        }

        fn verify_password(&self, password: &str, password_hash: &str) -> PortResult<bool> {
            Ok(self.hash_password(password)? == password_hash)
        }
    }

    /// Tokens of the form `token:<id>:<username>`.
    pub(crate) struct PlainTokens;

    impl TokenService for PlainTokens {
        fn issue(&self, user: &User) -> PortResult<String> {
            Ok(format!("token:{}:{}", user.id, user.username))
        }

        fn verify(&self, token: &str) -> PortResult<AuthUser> {
            let mut parts = token.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("token"), Some(id), Some(username)) => Ok(AuthUser {
                    user_id: id.parse().map_err(|_| PortError::Unauthorized)?,
                    username: username.to_string(),
                }),
                _ => Err(PortError::Unauthorized),
            }
        }
    }

    fn service(store: Arc<MockStore>) -> AuthService {
        AuthService::new(store, Arc::new(ReversedHasher), Arc::new(PlainTokens))
    }

    #[tokio::test]
    async fn register_then_login_returns_the_same_user() {
        let store = Arc::new(MockStore::new());
        let auth = service(store.clone());

        let registered = auth.register("alice", "a@x.com", "secret1").await.unwrap();
        let logged_in = auth.login("alice", "secret1").await.unwrap();

        assert_eq!(registered.user.id, logged_in.user.id);
        assert_eq!(
            auth.verify_token(&logged_in.token).unwrap(),
            AuthUser {
                user_id: registered.user.id,
                username: "alice".to_string()
            }
        );

        let stored = store
            .get_credentials_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "secret1");
    }

    #[tokio::test]
    async fn register_validates_its_input() {
        let auth = service(Arc::new(MockStore::new()));

        for (username, email, password) in [
            ("", "a@x.com", "secret1"),
            ("alice", "  ", "secret1"),
            ("alice", "a@x.com", ""),
            ("alice", "a@x.com", "12345"),
        ] {
            let err = auth.register(username, email, password).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");
        }

        let long_name = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            auth.register(&long_name, "a@x.com", "secret1").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let auth = service(Arc::new(MockStore::new()));
        auth.register("alice", "a@x.com", "secret1").await.unwrap();

        assert!(matches!(
            auth.register("alice", "other@x.com", "secret1").await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            auth.register("bob", "a@x.com", "secret1").await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail_identically() {
        let auth = service(Arc::new(MockStore::new()));
        auth.register("alice", "a@x.com", "secret1").await.unwrap();

        let wrong_password = auth.login("alice", "secret2").await.unwrap_err();
        let unknown_user = auth.login("mallory", "secret1").await.unwrap_err();

        assert!(matches!(wrong_password, ServiceError::Unauthorized(_)));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn garbage_tokens_are_unauthorized() {
        let auth = service(Arc::new(MockStore::new()));
        assert!(matches!(
            auth.verify_token("not-a-token"),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn current_user_reports_missing_accounts() {
        let auth = service(Arc::new(MockStore::new()));
        assert!(matches!(
            auth.current_user(42).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
