#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod model;
pub mod rate_limit;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing, MailFairing};
use logging::LoggerFairing;
use rate_limit::RateLimiter;

/// Assemble the server: config, database, mail relay, and rate limiter all
/// come online during ignition, so a launch with any of them broken fails
/// fast instead of limping.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(MailFairing)
        .attach(LoggerFairing)
        .manage(RateLimiter::new())
        .mount("/", api::routes())
}
