//! User business logic service.
//!
//! Registration, login and profile lookup. The credential store, password
//! hasher and token codec are injected at construction.

use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::user::models::{PublicProfile, UserProfile};
use crate::auth::models::{LoginRequest, LoginResponse, RegisterRequest};
use crate::database::models::{CreateUser, User};
use crate::errors::{ServiceError, ServiceResult, validation_errors_to_message};
use crate::repositories::user_repository::CredentialStore;
use crate::utils::jwt::{Identity, TokenCodec};
use crate::utils::password::{HashingError, PasswordHasher};

/// Verified against when no user matches, so an unknown identifier costs the
/// same as a wrong password.
const DUMMY_PASSWORD: &str = "authgate-dummy-password";

pub struct UserService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenCodec,
    dummy_digest: String,
}

impl UserService {
    /// Creates a new UserService instance.
    ///
    /// # Arguments
    /// * `store` - Credential store for user records
    /// * `hasher` - Password hasher
    /// * `tokens` - Bearer token codec
    ///
    /// # Errors
    /// Returns `ServiceError::Internal` if the timing-equalisation digest
    /// cannot be computed.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenCodec,
    ) -> ServiceResult<Self> {
        let dummy_digest = hasher
            .hash(DUMMY_PASSWORD)
            .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {}", e)))?;

        Ok(Self {
            store,
            hasher,
            tokens,
            dummy_digest,
        })
    }

    /// Registers a new user.
    ///
    /// # Returns
    /// The newly created User
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Validation failures (empty or malformed fields)
    /// - Username or email already taken (`AlreadyExists`)
    /// - Hashing or persistence failures (`Internal`)
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<User> {
        if let Err(validation_errors) = request.validate() {
            return Err(ServiceError::validation(validation_errors_to_message(
                &validation_errors,
            )));
        }

        let password_hash = self.hash_password(request.password).await?;

        let data = CreateUser {
            id: Uuid::new_v4().to_string(),
            username: request.username,
            email: request.email,
            description: request.description.unwrap_or_default(),
            password_hash,
        };

        let user = self.store.insert_user(data).await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Authenticates by username or email and issues a bearer token.
    ///
    /// Every failure (unknown identifier, wrong password, blank input) is the
    /// same `ServiceError::Authentication`.
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        if request.validate().is_err() {
            debug!("Login rejected: blank identifier or password");
            return Err(ServiceError::Authentication);
        }

        let user = self.find_by_identifier(&request.identifier).await?;

        let (digest, user) = match user {
            Some(user) => (user.password_hash.clone(), Some(user)),
            None => (self.dummy_digest.clone(), None),
        };

        let password_matches = self.verify_password(request.password, digest).await?;

        let user = match user {
            Some(user) if password_matches => user,
            Some(user) => {
                warn!("Login failed for user {}: wrong password", user.id);
                return Err(ServiceError::Authentication);
            }
            None => {
                warn!("Login failed: unknown identifier");
                return Err(ServiceError::Authentication);
            }
        };

        let token = self.tokens.issue(&Identity::new(&user.id)).map_err(|e| {
            ServiceError::internal_error(format!("Token generation failed: {}", e))
        })?;

        info!("User {} logged in", user.id);
        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl_seconds(),
        })
    }

    /// Profile of the user behind a validated token.
    ///
    /// # Errors
    /// Returns `ServiceError::NotFound` if the record no longer exists
    pub async fn current_user(&self, identity: &Identity) -> ServiceResult<UserProfile> {
        let user = self
            .store
            .find_by_id(&identity.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", &identity.user_id))?;

        Ok(UserProfile::from(user))
    }

    /// Public profile by username.
    pub async fn public_profile(&self, username: &str) -> ServiceResult<PublicProfile> {
        let user = self
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", username))?;

        Ok(PublicProfile::from(user))
    }

    async fn find_by_identifier(&self, identifier: &str) -> ServiceResult<Option<User>> {
        if let Some(user) = self.store.find_by_username(identifier).await? {
            return Ok(Some(user));
        }
        Ok(self.store.find_by_email(identifier).await?)
    }

    /// bcrypt is CPU bound; keep it off the async workers.
    async fn hash_password(&self, password: String) -> ServiceResult<String> {
        let hasher = self.hasher;
        task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::internal_error(format!("Hashing task failed: {}", e)))?
            .map_err(|e| match e {
                HashingError::TooLong => {
                    ServiceError::validation("password: Password must be at most 72 bytes")
                }
                other => ServiceError::internal_error(format!("Password hashing failed: {}", other)),
            })
    }

    async fn verify_password(&self, password: String, digest: String) -> ServiceResult<bool> {
        let hasher = self.hasher;
        task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| ServiceError::internal_error(format!("Verification task failed: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::errors::StoreError;
    use crate::repositories::user_repository::UserRepository;
    use async_trait::async_trait;

    pub(crate) const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    pub(crate) async fn test_service() -> UserService {
        let store = Arc::new(UserRepository::new(test_pool().await));
        UserService::new(
            store,
            PasswordHasher::with_cost(4),
            TokenCodec::new(SECRET, 3600, 0),
        )
        .unwrap()
    }

    /// Store whose every call fails at the backend.
    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn insert_user(&self, _data: CreateUser) -> Result<User, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("database is unavailable")))
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("database is unavailable")))
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("database is unavailable")))
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("database is unavailable")))
        }
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            description: None,
        }
    }

    fn login_request(identifier: &str, password: &str) -> LoginRequest {
        LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = test_service().await;
        let user = service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&user.id).is_ok());
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "secret123");
        assert!(PasswordHasher::new().verify("secret123", &user.password_hash));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let service = test_service().await;

        let err = service
            .register(register_request("", "alice@x.com", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .register(register_request("alice", "not-an-email", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .register(register_request("alice", "alice@x.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .register(register_request("alice", "alice@x.com", &"p".repeat(73)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict_and_keeps_original() {
        let service = test_service().await;
        let original = service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice", "other@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));

        let stored = service.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.email, "alice@x.com");
        assert_eq!(stored.password_hash, original.password_hash);
        assert!(service.store.find_by_email("other@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let service = test_service().await;
        service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        let err = service
            .register(register_request("bob", "alice@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let service = test_service().await;
        let user = service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        for identifier in ["alice", "alice@x.com"] {
            let response = service
                .login(login_request(identifier, "secret123"))
                .await
                .unwrap();
            assert_eq!(response.token_type, "Bearer");
            assert_eq!(response.expires_in, 3600);

            let identity = service.tokens.validate(&response.token).unwrap();
            assert_eq!(identity.user_id, user.id);
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = test_service().await;
        service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        let wrong_password = service
            .login(login_request("alice", "wrong"))
            .await
            .unwrap_err();
        let unknown_user = service
            .login(login_request("mallory", "secret123"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ServiceError::Authentication));
        assert!(matches!(unknown_user, ServiceError::Authentication));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_login_by_email_when_another_username_looks_like_it() {
        let service = test_service().await;

        let err = service
            .register(register_request("bob@x.com", "a@x.com", "pwA"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let bob = service
            .register(register_request("bob", "bob@x.com", "pwB"))
            .await
            .unwrap();
        let response = service
            .login(login_request("bob@x.com", "pwB"))
            .await
            .unwrap();
        assert_eq!(service.tokens.validate(&response.token).unwrap().user_id, bob.id);
    }

    #[tokio::test]
    async fn test_register_rejects_whitespace_username() {
        let service = test_service().await;
        let err = service
            .register(register_request("   ", "alice@x.com", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_during_login_is_internal() {
        let service = UserService::new(
            Arc::new(FailingStore),
            PasswordHasher::with_cost(4),
            TokenCodec::new(SECRET, 3600, 0),
        )
        .unwrap();

        let err = service
            .login(login_request("alice", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal { .. }));

        let err = service
            .login(login_request("alice@x.com", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_unrepresentable_token_expiry_is_internal() {
        let service = UserService::new(
            Arc::new(UserRepository::new(test_pool().await)),
            PasswordHasher::with_cost(4),
            TokenCodec::new(SECRET, 10_000_000_000_000, 0),
        )
        .unwrap();
        service
            .register(register_request("alice", "alice@x.com", "secret123"))
            .await
            .unwrap();

        let err = service
            .login(login_request("alice", "secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_login_blank_input_is_authentication_error() {
        let service = test_service().await;
        let err = service.login(login_request("", "")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication));
    }

    #[tokio::test]
    async fn test_current_user_and_public_profile() {
        let service = test_service().await;
        let mut request = register_request("alice", "alice@x.com", "secret123");
        request.description = Some("hello".to_string());
        let user = service.register(request).await.unwrap();

        let profile = service.current_user(&Identity::new(&user.id)).await.unwrap();
        assert_eq!(
            profile,
            UserProfile {
                id: user.id.clone(),
                username: "alice".to_string(),
                email: "alice@x.com".to_string(),
                description: "hello".to_string(),
            }
        );

        let public = service.public_profile("alice").await.unwrap();
        assert_eq!(public.description, "hello");

        let err = service
            .current_user(&Identity::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        let err = service.public_profile("nobody").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
