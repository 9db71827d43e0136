use std::collections::HashSet;

use diesel::result::{DatabaseErrorKind, Error};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket_db_pools::diesel::prelude::*;

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::models::{Event, EventPhase, EventSummary, Participant, ParticipantInput, TagGroup};
use crate::rules;
use crate::schema::{events, participants, team_members, teams};

#[get("/events")]
pub async fn list_events(mut db: Db) -> ApiResult<Json<Vec<Event>>> {
    let all_events = events::table
        .order(events::id.desc())
        .select(Event::as_select())
        .load(&mut db)
        .await?;
    Ok(Json(all_events))
}

#[get("/events/<event_id>")]
pub async fn get_event(mut db: Db, event_id: i32) -> ApiResult<Json<EventSummary>> {
    let event = db::load_event(&mut db, event_id).await?;

    let participant_count: i64 = participants::table
        .filter(participants::event_id.eq(event_id))
        .count()
        .get_result(&mut db)
        .await?;
    let leader_count: i64 = participants::table
        .filter(participants::event_id.eq(event_id))
        .filter(participants::is_leader.eq(true))
        .count()
        .get_result(&mut db)
        .await?;
    let team_count: i64 = teams::table
        .filter(teams::event_id.eq(event_id))
        .count()
        .get_result(&mut db)
        .await?;

    Ok(Json(EventSummary {
        event,
        participants: participant_count,
        leaders: leader_count,
        teams: team_count,
    }))
}

// Self registration, open only while the event is in registration
#[post("/events/<event_id>/participants", format = "json", data = "<request>")]
pub async fn register_participant(
    mut db: Db,
    event_id: i32,
    request: Json<ParticipantInput>,
) -> ApiResult<(Status, Json<Participant>)> {
    db::load_event_in_phase(&mut db, event_id, EventPhase::Registration).await?;
    let new_participant = rules::normalize_participant(event_id, &request)?;

    let result = diesel::insert_into(participants::table)
        .values(&new_participant)
        .execute(&mut db)
        .await;

    match result {
        Ok(_) => {}
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(ApiError::Conflict(format!(
                "{} is already registered for this event",
                new_participant.email
            )));
        }
        Err(e) => return Err(e.into()),
    }

    let participant_id = db::last_insert_id(&mut db).await?;
    tracing::info!(
        event_id,
        participant_id,
        tag = %new_participant.interest_tag,
        "participant registered"
    );

    let participant = db::load_participant(&mut db, event_id, participant_id).await?;
    Ok((Status::Created, Json(participant)))
}

#[get("/events/<event_id>/participants?<tag>")]
pub async fn list_participants(
    mut db: Db,
    event_id: i32,
    tag: Option<String>,
) -> ApiResult<Json<Vec<Participant>>> {
    db::load_event(&mut db, event_id).await?;

    let mut query = participants::table
        .filter(participants::event_id.eq(event_id))
        .order(participants::id.asc())
        .select(Participant::as_select())
        .into_boxed();
    if let Some(tag) = tag {
        query = query.filter(participants::interest_tag.eq(tag.trim().to_lowercase()));
    }

    Ok(Json(query.load(&mut db).await?))
}

#[get("/events/<event_id>/participants/unassigned")]
pub async fn list_unassigned(mut db: Db, event_id: i32) -> ApiResult<Json<Vec<Participant>>> {
    db::load_event(&mut db, event_id).await?;

    let assigned: HashSet<i32> = team_members::table
        .inner_join(teams::table)
        .filter(teams::event_id.eq(event_id))
        .select(team_members::participant_id)
        .load::<i32>(&mut db)
        .await?
        .into_iter()
        .collect();

    let unassigned = participants::table
        .filter(participants::event_id.eq(event_id))
        .order(participants::id.asc())
        .select(Participant::as_select())
        .load(&mut db)
        .await?
        .into_iter()
        .filter(|p| !assigned.contains(&p.id))
        .collect();

    Ok(Json(unassigned))
}

#[get("/events/<event_id>/tags")]
pub async fn list_tags(mut db: Db, event_id: i32) -> ApiResult<Json<Vec<TagGroup>>> {
    db::load_event(&mut db, event_id).await?;

    let tags = participants::table
        .filter(participants::event_id.eq(event_id))
        .select(participants::interest_tag)
        .load::<String>(&mut db)
        .await?;

    Ok(Json(rules::group_by_tag(tags.iter().map(String::as_str))))
}
