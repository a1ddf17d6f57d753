use crate::error::{Error, Result};
use crate::model::{auth::AuthToken, db::User, mongodb::Coll};

/// Return the user behind a token, failing `NotFound` if the account has
/// disappeared since the token was minted.
pub async fn user_by_token(token: &AuthToken, users: &Coll<User>) -> Result<User> {
    users
        .find_one(token.id().as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.id())))
}

/// Return the user behind a token, requiring a verified account.
/// A missing or unverified user cannot act as a voter.
pub async fn verified_user_by_token(
    token: &AuthToken,
    users: &Coll<User>,
) -> Result<User> {
    let user = users
        .find_one(token.id().as_doc(), None)
        .await?
        .ok_or_else(|| Error::Unauthorized("No user for this token".to_string()))?;
    if !user.is_verified {
        return Err(Error::Unauthorized("User is not verified".to_string()));
    }
    Ok(user)
}

/// Return the user behind a token, requiring the admin flag.
/// Anything short of an admin account is `Forbidden`.
pub async fn admin_by_token(token: &AuthToken, users: &Coll<User>) -> Result<User> {
    users
        .find_one(token.id().as_doc(), None)
        .await?
        .filter(|user| user.is_admin)
        .ok_or_else(|| Error::Forbidden("Admin access required".to_string()))
}
