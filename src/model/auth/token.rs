use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    model::{db::User, mongodb::Id},
    Config,
};

/// A validated bearer token identifying a specific user.
///
/// Validation is stateless: any holder of an unexpired, correctly signed
/// token is treated as that user for the token's lifetime. There is no
/// server-side revocation list, so logout is purely client-side; this is
/// a documented limitation, not a bug.
pub struct AuthToken {
    id: Id,
}

/// The signed claims: subject user ID (hex) plus expiry.
#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

impl AuthToken {
    /// A token for the given user.
    pub fn for_user(user: &User) -> Self {
        Self { id: user.id }
    }

    /// The subject user ID.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Serialize and sign, valid for `auth_ttl` from now.
    pub fn sign(&self, config: &Config) -> String {
        self.sign_with_expiry(config, Utc::now() + config.auth_ttl())
    }

    fn sign_with_expiry(&self, config: &Config, expire_at: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: self.id.to_string(),
            exp: expire_at.timestamp(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap() // Infallible: HS256 with string claims.
    }

    /// Verify a presented token. Fails closed: expiry, signature, and
    /// structure errors all refuse the request.
    pub fn verify(token: &str, config: &Config) -> Result<Self, Error> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )?;
        let id = data
            .claims
            .sub
            .parse::<Id>()
            .map_err(|_| Error::Unauthorized("Malformed token subject".to_string()))?;
        Ok(Self { id })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Extract and verify the `Authorization: Bearer` header.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // `Config` is always managed.

        let Some(header) = req.headers().get_one("Authorization") else {
            return request::Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Missing Authorization header".to_string()),
            ));
        };
        let Some(token) = header.strip_prefix("Bearer ") else {
            return request::Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Authorization header is not a bearer token".to_string()),
            ));
        };

        match Self::verify(token, config) {
            Ok(token) => request::Outcome::Success(token),
            Err(err) => request::Outcome::Failure((Status::Unauthorized, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::errors::ErrorKind;

    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let config = Config::example();
        let user = User::example();
        let token = AuthToken::for_user(&user).sign(&config);
        let verified = AuthToken::verify(&token, &config).unwrap();
        assert_eq!(verified.id(), user.id);
    }

    #[test]
    fn expired_token_is_refused() {
        let config = Config::example();
        let user = User::example();
        // Well past the default decoding leeway.
        let token = AuthToken::for_user(&user)
            .sign_with_expiry(&config, Utc::now() - Duration::hours(2));
        match AuthToken::verify(&token, &config) {
            Err(Error::Jwt(err)) => {
                assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
            }
            Err(other) => panic!("expected expired-signature error, got {other}"),
            Ok(_) => panic!("expired token verified"),
        }
    }

    #[test]
    fn tampered_token_is_refused() {
        let config = Config::example();
        let other_config = Config::example_other_secret();
        let user = User::example();
        let token = AuthToken::for_user(&user).sign(&other_config);
        assert!(matches!(
            AuthToken::verify(&token, &config),
            Err(Error::Jwt(_))
        ));
    }

    #[test]
    fn garbage_token_is_refused() {
        let config = Config::example();
        assert!(AuthToken::verify("definitely.not.a-jwt", &config).is_err());
    }
}
