pub mod auth;
pub mod candidate;
pub mod email;
pub mod id;
pub mod results;
pub mod user;
