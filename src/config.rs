use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    mail::Mailer,
    model::{
        api::email::Email,
        db::ensure_admin_exists,
        mongodb::{ensure_indexes_exist, Coll},
    },
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    otp_ttl: u32,
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of an issued OTP code in seconds.
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl.into())
    }

    /// Valid lifetime of a bearer token in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign bearer tokens.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database connection and first-launch seeding.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    admin_email: String,
    // secrets
    db_uri: String,
    admin_password: String,
}

/// A fairing that connects to MongoDB, ensures the unique indexes and the
/// default admin account exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let admin_email = match config.admin_email.parse::<Email>() {
            Ok(email) => email,
            Err(e) => {
                error!("Bad admin_email in config: {e}");
                return Err(rocket);
            }
        };

        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // The unique indexes are load-bearing for the single-vote and
        // unique-email invariants; refuse to launch without them.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        let users = Coll::from_db(&db);
        if let Err(e) =
            ensure_admin_exists(&users, &admin_email, &config.admin_password).await
        {
            error!("Failed to seed admin account: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "evoting".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the outbound mail relay.
#[derive(Deserialize)]
struct MailConfig {
    // non-secrets
    mail_api_url: String,
    mail_sender: String,
    // secrets
    mail_api_key: String,
}

/// A fairing that loads the mail config and places a `Mailer` into
/// managed state.
pub struct MailFairing;

#[rocket::async_trait]
impl Fairing for MailFairing {
    fn info(&self) -> Info {
        Info {
            name: "Mail relay",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<MailConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mail config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let mailer = Mailer::new(
            config.mail_api_url,
            config.mail_api_key,
            config.mail_sender,
        );
        info!("Loaded mail relay config");

        rocket = rocket.manage(mailer);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                otp_ttl: 600,
                auth_ttl: 3600,
                jwt_secret: "test-jwt-secret".to_string(),
            }
        }

        pub fn example_other_secret() -> Self {
            Self {
                jwt_secret: "a-different-secret".to_string(),
                ..Self::example()
            }
        }
    }
}
