use diesel::result::{DatabaseErrorKind, Error};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket_db_pools::diesel::prelude::*;

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::models::{CastVoteRequest, EventPhase, NewVote, Participant, Vote, VoteStatusResponse};
use crate::rules;
use crate::schema::{participants, votes};

// Route to cast a vote for a peer leader in the voter's interest group
#[post("/events/<event_id>/votes", format = "json", data = "<vote_request>")]
pub async fn cast_vote(
    mut db: Db,
    event_id: i32,
    vote_request: Json<CastVoteRequest>,
) -> ApiResult<Status> {
    db::load_event_in_phase(&mut db, event_id, EventPhase::Voting).await?;

    let voter = db::load_participant(&mut db, event_id, vote_request.voter_id).await?;
    let candidate = db::load_participant(&mut db, event_id, vote_request.candidate_id).await?;
    rules::check_vote(&voter, &candidate)?;

    let new_vote = NewVote {
        event_id,
        voter_id: voter.id,
        candidate_id: candidate.id,
    };

    let result = diesel::insert_into(votes::table)
        .values(&new_vote)
        .execute(&mut db)
        .await;

    match result {
        Ok(_) => {
            tracing::debug!(event_id, voter = voter.id, candidate = candidate.id, "vote cast");
            Ok(Status::Created)
        }
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
            ApiError::Conflict(format!("participant {} has already voted", voter.id)),
        ),
        Err(e) => Err(e.into()),
    }
}

#[get("/events/<event_id>/participants/<participant_id>/vote")]
pub async fn get_vote_status(
    mut db: Db,
    event_id: i32,
    participant_id: i32,
) -> ApiResult<Json<VoteStatusResponse>> {
    db::load_participant(&mut db, event_id, participant_id).await?;

    let vote = votes::table
        .filter(votes::event_id.eq(event_id))
        .filter(votes::voter_id.eq(participant_id))
        .select(Vote::as_select())
        .first(&mut db)
        .await
        .optional()?;

    Ok(Json(VoteStatusResponse {
        has_voted: vote.is_some(),
        candidate_id: vote.map(|v| v.candidate_id),
    }))
}

#[get("/events/<event_id>/leaders")]
pub async fn list_leaders(mut db: Db, event_id: i32) -> ApiResult<Json<Vec<Participant>>> {
    db::load_event(&mut db, event_id).await?;

    let leaders = participants::table
        .filter(participants::event_id.eq(event_id))
        .filter(participants::is_leader.eq(true))
        .order(participants::id.asc())
        .select(Participant::as_select())
        .load(&mut db)
        .await?;

    Ok(Json(leaders))
}
