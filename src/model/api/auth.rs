use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::User};

/// Raw email + password credentials, received from a client at
/// registration or login. The password is never stored directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

/// Body of a `verify-otp` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

/// Body of a `resend-otp` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Successful authentication: a bearer token plus a summary of who it is for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: ApiId,
    pub email: String,
    pub is_admin: bool,
    pub has_voted: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            email: user.email.to_string(),
            is_admin: user.is_admin,
            has_voted: user.has_voted,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCredentials {
        pub fn example() -> Self {
            Self {
                email: "voter@example.com".to_string(),
                password: "secret1".to_string(),
            }
        }
    }
}
