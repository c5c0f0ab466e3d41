//! Profile shapes returned by the user endpoints.

use serde::{Deserialize, Serialize};

use crate::database::models::User;

/// Full profile of the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub description: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            description: user.description,
        }
    }
}

/// What anyone may see about a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicProfile {
    pub username: String,
    pub description: String,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            description: user.description,
        }
    }
}
