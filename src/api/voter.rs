use mongodb::{bson::doc, error::Error as DbError, Client, ClientSession};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            candidate::{BallotResponse, VoteRequest},
            user::UserProfile,
        },
        auth::AuthToken,
        db::{Candidate, NewVote, User, VoteCore},
        mongodb::{is_duplicate_key_error, is_transient_transaction_error, Coll, Id},
    },
    rate_limit::{GlobalRateLimit, RateLimit, VoteLimit},
};

use super::common::{user_by_token, verified_user_by_token};

pub fn routes() -> Vec<Route> {
    routes![get_candidates, cast_vote, profile]
}

/// How many times a cast is attempted when the transaction keeps losing
/// storage-level races (e.g. concurrent `$inc`s on a popular candidate).
const MAX_CAST_ATTEMPTS: u32 = 3;

#[get("/candidates")]
async fn get_candidates(
    _limit: GlobalRateLimit,
    token: AuthToken,
    users: Coll<User>,
    candidates: Coll<Candidate>,
) -> Result<Json<BallotResponse>> {
    let user = verified_user_by_token(&token, &users).await?;

    let all = candidates
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(Json(BallotResponse {
        candidates: all.into_iter().map(Into::into).collect(),
        has_voted: user.has_voted,
    }))
}

/// Cast the caller's single vote.
///
/// The vote insert, counter increment, and `has_voted` flip happen in one
/// transaction. Two concurrent casts for the same user race on the unique
/// `votes.user_id` index and the `has_voted: false` filter; exactly one
/// commits and the other surfaces as a conflict, whether the server reports
/// the loss as a duplicate key or as a transient write conflict. Errors on
/// any step abort the transaction (explicitly or on session drop), so no
/// partial state survives.
#[post("/vote", data = "<request>", format = "json")]
async fn cast_vote(
    _limit: RateLimit<VoteLimit>,
    token: AuthToken,
    request: Json<VoteRequest>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    votes: Coll<NewVote>,
    db_client: &State<Client>,
) -> Result<()> {
    let user = verified_user_by_token(&token, &users).await?;
    if user.has_voted {
        return Err(already_voted());
    }

    let candidate_id = request
        .candidate_id
        .parse::<Id>()
        .map_err(|_| Error::Validation("Malformed candidate ID".to_string()))?;
    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;

    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = match try_cast(&users, &candidates, &votes, db_client, &user, &candidate)
            .await
        {
            Ok(()) => return Ok(()),
            Err(Error::Db(err)) if is_transient_transaction_error(&err) => err,
            Err(err) => return Err(err),
        };

        // The transaction lost a race. Re-read before deciding: if this
        // user's vote landed through a concurrent request, that is a
        // conflict, not a storage failure.
        let has_voted = users
            .find_one(user.id.as_doc(), None)
            .await?
            .map(|current| current.has_voted)
            .unwrap_or(false);
        if has_voted || attempts >= MAX_CAST_ATTEMPTS {
            return Err(lost_race_error(has_voted, err));
        }
        warn!(
            "Retrying vote cast for user {} after transient write conflict",
            user.id
        );
    }
}

/// One transactional cast attempt: insert the vote, bump the candidate's
/// count, and flip the caller's `has_voted`, all or nothing.
async fn try_cast(
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    votes: &Coll<NewVote>,
    db_client: &Client,
    user: &User,
    candidate: &Candidate,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let vote = VoteCore::new(user.id, candidate.id);
    if let Err(err) = votes.insert_one_with_session(&vote, None, &mut session).await {
        abort_quietly(&mut session).await;
        return Err(if is_duplicate_key_error(&err) {
            already_voted()
        } else {
            err.into()
        });
    }

    let incremented = candidates
        .update_one_with_session(
            candidate.id.as_doc(),
            doc! { "$inc": { "vote_count": 1 } },
            None,
            &mut session,
        )
        .await?;
    if incremented.modified_count == 0 {
        // The candidate was deleted between the lookup and the update.
        abort_quietly(&mut session).await;
        return Err(Error::not_found(format!("Candidate {}", candidate.id)));
    }

    let flipped = users
        .update_one_with_session(
            doc! { "_id": *user.id, "has_voted": false },
            doc! { "$set": { "has_voted": true } },
            None,
            &mut session,
        )
        .await?;
    if flipped.modified_count == 0 {
        abort_quietly(&mut session).await;
        return Err(already_voted());
    }

    if let Err(err) = session.commit_transaction().await {
        return Err(if is_duplicate_key_error(&err) {
            already_voted()
        } else {
            err.into()
        });
    }

    Ok(())
}

/// Roll back a failed attempt without masking the error about to be
/// returned; if the abort itself fails, the server will time the
/// transaction out on its own.
async fn abort_quietly(session: &mut ClientSession) {
    if let Err(err) = session.abort_transaction().await {
        warn!("Failed to abort vote transaction: {err}");
    }
}

fn already_voted() -> Error {
    Error::Conflict("You have already voted".to_string())
}

/// Final resolution once cast retries are exhausted: a vote that landed
/// concurrently is a conflict; otherwise the storage failure stands.
fn lost_race_error(has_voted: bool, err: DbError) -> Error {
    if has_voted {
        already_voted()
    } else {
        err.into()
    }
}

#[get("/user/profile")]
async fn profile(
    _limit: GlobalRateLimit,
    token: AuthToken,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let user = user_by_token(&token, &users).await?;
    Ok(Json((&user).into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_error() -> DbError {
        DbError::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "write conflict",
        ))
    }

    #[test]
    fn race_loser_with_landed_vote_gets_a_conflict() {
        assert!(matches!(
            lost_race_error(true, storage_error()),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn race_loser_without_landed_vote_surfaces_storage_failure() {
        assert!(matches!(
            lost_race_error(false, storage_error()),
            Error::Db(_)
        ));
    }
}
