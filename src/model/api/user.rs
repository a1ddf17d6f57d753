use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::User};

/// A user's own profile view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ApiId,
    pub email: String,
    pub is_admin: bool,
    pub has_voted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            email: user.email.to_string(),
            is_admin: user.is_admin,
            has_voted: user.has_voted,
            created_at: user.created_at,
        }
    }
}
