use chrono::Utc;
use mongodb::bson::{doc, Bson};
use rocket::{
    http::Status,
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    mail::Mailer,
    model::{
        api::{
            auth::{AuthResponse, ResendOtpRequest, UserCredentials, VerifyOtpRequest},
            email::Email,
        },
        auth::AuthToken,
        db::{hash_password, NewUser, User, UserCore},
        mongodb::{is_duplicate_key_error, Coll},
        otp::Code,
    },
    rate_limit::{LoginLimit, RateLimit, RegisterLimit, ResendOtpLimit, VerifyOtpLimit},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, verify_otp, login, resend_otp]
}

const MIN_PASSWORD_LENGTH: usize = 6;

#[cfg_attr(test, allow(unused_variables))]
#[post("/register", data = "<credentials>", format = "json")]
async fn register(
    _limit: RateLimit<RegisterLimit>,
    credentials: Json<UserCredentials>,
    users: Coll<NewUser>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<Custom<()>> {
    let email = credentials
        .email
        .parse::<Email>()
        .map_err(|err| Error::Validation(err.to_string()))?;
    if credentials.password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    // The account starts unverified, with its first OTP already pending.
    let mut user = UserCore::new(email, hash_password(&credentials.password));
    let code = Code::random();
    user.otp = Some(code);
    user.otp_expires = Some(Utc::now() + config.otp_ttl());

    if let Err(err) = users.insert_one(&user, None).await {
        return Err(if is_duplicate_key_error(&err) {
            Error::Conflict(format!("Email already registered: {}", user.email))
        } else {
            err.into()
        });
    }

    // The user and OTP are committed; a failed send degrades the response
    // but does not roll them back.
    #[cfg(not(test))]
    mailer.send_otp(&user.email, &code, config.otp_ttl()).await?;

    Ok(Custom(Status::Created, ()))
}

#[post("/verify-otp", data = "<request>", format = "json")]
async fn verify_otp(
    _limit: RateLimit<VerifyOtpLimit>,
    request: Json<VerifyOtpRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let email = request
        .email
        .parse::<Email>()
        .map_err(|err| Error::Validation(err.to_string()))?;
    let code = request
        .code
        .parse::<Code>()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let mut user = users
        .find_one(doc! { "email": email.as_str() }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User with email {email}")))?;

    user.check_otp(&code, Utc::now())?;

    // Filtering on `is_verified: false` makes the transition exactly-once:
    // a concurrent duplicate verification matches nothing and conflicts.
    let filter = doc! { "_id": *user.id, "is_verified": false };
    let update = doc! {
        "$set": { "is_verified": true, "otp": Bson::Null, "otp_expires": Bson::Null },
    };
    let result = users.update_one(filter, update, None).await?;
    if result.modified_count == 0 {
        return Err(Error::Conflict("User is already verified".to_string()));
    }
    user.is_verified = true;
    user.otp = None;
    user.otp_expires = None;

    let token = AuthToken::for_user(&user).sign(config);
    Ok(Json(AuthResponse {
        token,
        user: (&user).into(),
    }))
}

#[post("/login", data = "<credentials>", format = "json")]
async fn login(
    _limit: RateLimit<LoginLimit>,
    credentials: Json<UserCredentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let email = credentials
        .email
        .parse::<Email>()
        .map_err(|err| Error::Validation(err.to_string()))?;

    // The same response for a missing user and a wrong password, so the
    // login endpoint cannot be used to probe which emails are registered.
    let user = users
        .find_one(doc! { "email": email.as_str() }, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| Error::Unauthorized("Invalid email or password".to_string()))?;

    if !user.is_verified {
        return Err(Error::Unauthorized(
            "Email not verified. Please verify your email first.".to_string(),
        ));
    }

    let token = AuthToken::for_user(&user).sign(config);
    Ok(Json(AuthResponse {
        token,
        user: (&user).into(),
    }))
}

#[cfg_attr(test, allow(unused_variables))]
#[post("/resend-otp", data = "<request>", format = "json")]
async fn resend_otp(
    _limit: RateLimit<ResendOtpLimit>,
    request: Json<ResendOtpRequest>,
    users: Coll<User>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<()> {
    let email = request
        .email
        .parse::<Email>()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let user = users
        .find_one(doc! { "email": email.as_str() }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User with email {email}")))?;
    if user.is_verified {
        return Err(Error::Conflict("User is already verified".to_string()));
    }

    // A fresh code replaces any pending one and restarts the validity
    // window from scratch.
    let code = Code::random();
    let expires = Utc::now() + config.otp_ttl();
    let update = doc! {
        "$set": {
            "otp": code.to_string(),
            "otp_expires": mongodb::bson::DateTime::from_chrono(expires),
        },
    };
    users.update_one(user.id.as_doc(), update, None).await?;

    #[cfg(not(test))]
    mailer.send_otp(&user.email, &code, config.otp_ttl()).await?;

    Ok(())
}
