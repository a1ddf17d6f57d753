use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database,
    IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    candidate::{Candidate, NewCandidate},
    user::{NewUser, User},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would demand `T: Clone`, which we don't need.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from managed state and wrap it in a
    /// collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

/// Ensure that all the required unique indexes exist on the given database.
///
/// These indexes are what make the one-vote-per-user and one-account-per-email
/// invariants hold under concurrent writes; the application surfaces the
/// resulting duplicate-key errors as conflicts.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One account per (normalized) email address.
    let email_index = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(email_index, None)
        .await?;

    // One vote per user, enforced by the store itself.
    let vote_index = IndexModel::builder()
        .keys(doc! { "user_id": 1 })
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    Ok(())
}
