//! Data structures for authentication-related requests and responses.
//!
//! None of the response shapes carry the password hash; they are built field
//! by field from the stored record.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::database::models::User;

/// Registration request payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "Username must be between 1-255 characters"
        ),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        email(message = "Must be a valid email"),
        length(max = 255, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 1024, message = "Description too long"))]
    pub description: Option<String>,
}

/// Usernames must not be blank and must not contain `@`, so a login
/// identifier can never match one user's username and another user's email.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message("Username must not be blank".into()));
    }
    if username.contains('@') {
        return Err(ValidationError::new("contains_at")
            .with_message("Username must not contain '@'".into()));
    }
    Ok(())
}

/// Returned after a successful registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for RegisterResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Login request payload. `identifier` is a username or an email.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Identifier is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response containing the bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64, // Token expiration in seconds
}
