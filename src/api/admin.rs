use mongodb::bson::{doc, Bson};
use rocket::{
    futures::TryStreamExt,
    http::Status,
    response::status::Custom,
    serde::json::Json,
    Route,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            candidate::{CandidateDetails, CandidateSpec},
            results::ElectionResults,
        },
        auth::AuthToken,
        db::{Candidate, NewCandidate, User, Vote},
        mongodb::{Coll, Id},
    },
    rate_limit::GlobalRateLimit,
};

use super::common::admin_by_token;

pub fn routes() -> Vec<Route> {
    routes![
        results,
        get_candidates,
        create_candidate,
        update_candidate,
        delete_candidate,
    ]
}

#[get("/admin/results")]
async fn results(
    _limit: GlobalRateLimit,
    token: AuthToken,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    admin_by_token(&token, &users).await?;

    let all = candidates
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    let total_votes = votes.count_documents(None, None).await?;
    let total_users = users
        .count_documents(doc! { "is_verified": true }, None)
        .await?;

    Ok(Json(ElectionResults::compute(all, total_votes, total_users)))
}

#[get("/admin/candidates")]
async fn get_candidates(
    _limit: GlobalRateLimit,
    token: AuthToken,
    users: Coll<User>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDetails>>> {
    admin_by_token(&token, &users).await?;

    let all = candidates
        .find(None, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    Ok(Json(all.into_iter().map(Into::into).collect()))
}

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _limit: GlobalRateLimit,
    token: AuthToken,
    spec: Json<CandidateSpec>,
    users: Coll<User>,
    new_candidates: Coll<NewCandidate>,
) -> Result<Custom<()>> {
    admin_by_token(&token, &users).await?;
    validate_spec(&spec)?;

    let candidate = NewCandidate::from(spec.0);
    new_candidates.insert_one(&candidate, None).await?;

    Ok(Custom(Status::Created, ()))
}

#[put("/admin/candidates/<id>", data = "<spec>", format = "json")]
async fn update_candidate(
    _limit: GlobalRateLimit,
    token: AuthToken,
    id: Id,
    spec: Json<CandidateSpec>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
) -> Result<()> {
    admin_by_token(&token, &users).await?;
    validate_spec(&spec)?;

    // The running count is deliberately not part of the update.
    let update = doc! {
        "$set": {
            "name": &spec.name,
            "party": &spec.party,
            "description": opt_string(&spec.description),
            "image_url": opt_string(&spec.image_url),
        },
    };
    let result = candidates.update_one(id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {id}")));
    }
    Ok(())
}

#[delete("/admin/candidates/<id>")]
async fn delete_candidate(
    _limit: GlobalRateLimit,
    token: AuthToken,
    id: Id,
    users: Coll<User>,
    candidates: Coll<Candidate>,
) -> Result<()> {
    admin_by_token(&token, &users).await?;

    // A single filtered delete, so the zero-votes guard cannot race with
    // a concurrent cast incrementing the counter.
    let result = candidates
        .delete_one(doc! { "_id": *id, "vote_count": 0 }, None)
        .await?;
    if result.deleted_count == 0 {
        return Err(match candidates.find_one(id.as_doc(), None).await? {
            Some(_) => {
                Error::Conflict("Cannot delete candidate with existing votes".to_string())
            }
            None => Error::not_found(format!("Candidate {id}")),
        });
    }
    Ok(())
}

fn validate_spec(spec: &CandidateSpec) -> Result<()> {
    if spec.name.trim().is_empty() || spec.party.trim().is_empty() {
        return Err(Error::Validation(
            "Candidate name and party are required".to_string(),
        ));
    }
    Ok(())
}

fn opt_string(value: &Option<String>) -> Bson {
    value
        .clone()
        .map(Bson::String)
        .unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_requires_name_and_party() {
        let mut spec = CandidateSpec {
            name: "Ada Lovelace".to_string(),
            party: "Analytical Party".to_string(),
            description: None,
            image_url: None,
        };
        assert!(validate_spec(&spec).is_ok());

        spec.name = "   ".to_string();
        assert!(matches!(validate_spec(&spec), Err(Error::Validation(_))));

        spec.name = "Ada Lovelace".to_string();
        spec.party = String::new();
        assert!(matches!(validate_spec(&spec), Err(Error::Validation(_))));
    }
}
