use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core cast-ballot data, as stored in the database.
///
/// Votes are append-only: never updated, never deleted. The unique index
/// on `user_id` is what bounds each user to a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCore {
    pub user_id: Id,
    pub candidate_id: Id,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(user_id: Id, candidate_id: Id) -> Self {
        Self {
            user_id,
            candidate_id,
            cast_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
