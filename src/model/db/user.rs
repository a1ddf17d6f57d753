use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use chrono::{DateTime, Utc};
use mongodb::{bson::doc, error::Error as DbError};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::email::Email,
    mongodb::{opt_chrono_datetime_as_bson_datetime, Coll, Id},
    otp::{Code, OtpError},
};

/// Core user data, as stored in the database.
///
/// A user is created unverified with a pending OTP, becomes verified by
/// confirming the code, and may then cast exactly one vote.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UserCore {
    pub email: Email,
    pub password_hash: String,
    pub is_verified: bool,
    pub has_voted: bool,
    pub is_admin: bool,
    /// Pending OTP code, if any. A pending code past its expiry means
    /// "unverified, needs a resend", not an error state.
    #[serde(default)]
    pub otp: Option<Code>,
    #[serde(default, with = "opt_chrono_datetime_as_bson_datetime")]
    pub otp_expires: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a new unverified, non-admin user with no pending OTP.
    pub fn new(email: Email, password_hash: String) -> Self {
        Self {
            email,
            password_hash,
            is_verified: false,
            has_voted: false,
            is_admin: false,
            otp: None,
            otp_expires: None,
            created_at: Utc::now(),
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to store a hash is via
        // `hash_password`, so it is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }

    /// Decide whether a submitted code verifies this user at time `now`.
    ///
    /// Pure decision logic: the caller applies the state transition, and a
    /// refused attempt must leave the pending code and expiry untouched.
    pub fn check_otp(&self, code: &Code, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.is_verified {
            return Err(OtpError::AlreadyVerified);
        }
        match (self.otp, self.otp_expires) {
            (Some(pending), Some(expires)) if now <= expires => {
                if pending == *code {
                    Ok(())
                } else {
                    Err(OtpError::Mismatch)
                }
            }
            _ => Err(OtpError::Expired),
        }
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    // 16 bytes is the recommended salt length for argon2:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())
        .unwrap() // Safe because the default `Config` is valid.
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure that at least one admin account exists, creating the configured
/// default one on first launch.
pub async fn ensure_admin_exists(
    users: &Coll<NewUser>,
    email: &Email,
    password: &str,
) -> Result<(), DbError> {
    let existing = users.find_one(doc! { "is_admin": true }, None).await?;
    if existing.is_none() {
        let mut admin = UserCore::new(email.clone(), hash_password(password));
        admin.is_verified = true;
        admin.is_admin = true;
        users.insert_one(&admin, None).await?;
        info!("Created default admin account {email}");
    }
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn example() -> Self {
            let mut user = Self::new(Email::example(), hash_password("secret1"));
            user.is_verified = true;
            user
        }

        pub fn example_unverified(code: Code, expires: DateTime<Utc>) -> Self {
            let mut user = Self::new(Email::example(), hash_password("secret1"));
            user.otp = Some(code);
            user.otp_expires = Some(expires);
            user
        }
    }

    impl User {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                user: UserCore::example(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let user = UserCore::example();
        assert!(user.verify_password("secret1"));
        assert!(!user.verify_password("secret2"));
        assert!(!user.verify_password(""));
    }

    #[test]
    fn fresh_hashes_are_salted() {
        assert_ne!(hash_password("secret1"), hash_password("secret1"));
    }

    #[test]
    fn check_otp_accepts_pending_code() {
        let now = Utc::now();
        let code = Code::random();
        let user = UserCore::example_unverified(code, now + Duration::minutes(10));
        assert_eq!(user.check_otp(&code, now), Ok(()));
    }

    #[test]
    fn check_otp_refuses_verified_user() {
        let user = UserCore::example();
        let code = Code::random();
        assert_eq!(
            user.check_otp(&code, Utc::now()),
            Err(OtpError::AlreadyVerified)
        );
    }

    #[test]
    fn check_otp_refuses_missing_code() {
        let mut user = UserCore::example();
        user.is_verified = false;
        assert_eq!(
            user.check_otp(&Code::random(), Utc::now()),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn check_otp_refuses_expired_code_even_on_match() {
        let now = Utc::now();
        let code = Code::random();
        let user = UserCore::example_unverified(code, now - Duration::seconds(1));
        assert_eq!(user.check_otp(&code, now), Err(OtpError::Expired));
    }

    #[test]
    fn check_otp_mismatch_leaves_state_pending() {
        let now = Utc::now();
        let code = "123456".parse::<Code>().unwrap();
        let wrong = "654321".parse::<Code>().unwrap();
        let user = UserCore::example_unverified(code, now + Duration::minutes(10));
        assert_eq!(user.check_otp(&wrong, now), Err(OtpError::Mismatch));
        // A wrong guess must not invalidate the pending code.
        assert_eq!(user.otp, Some(code));
        assert_eq!(user.check_otp(&code, now), Ok(()));
    }
}
