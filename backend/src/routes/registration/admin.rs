use std::collections::HashSet;

use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket_db_pools::diesel::prelude::*;

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AdvancePhaseRequest, CreateEventRequest, Event, EventPhase, ImportReport, NewEvent,
    ParticipantInput,
};
use crate::routes::session::require_admin;
use crate::rules;
use crate::schema::{events, participants};

const MAX_EVENT_NAME_LEN: usize = 200;

#[post("/admin/events", format = "json", data = "<request>")]
pub async fn create_event(
    mut db: Db,
    cookies: &CookieJar<'_>,
    request: Json<CreateEventRequest>,
) -> ApiResult<(Status, Json<Event>)> {
    require_admin(cookies, &mut db).await?;

    let name = request.name.trim();
    if name.is_empty() || name.chars().count() > MAX_EVENT_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "event name must be 1 to {MAX_EVENT_NAME_LEN} characters"
        )));
    }

    let new_event = NewEvent {
        name: name.to_string(),
        description: request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        phase: EventPhase::Registration.as_str().to_string(),
    };

    diesel::insert_into(events::table)
        .values(&new_event)
        .execute(&mut db)
        .await?;
    let event_id = db::last_insert_id(&mut db).await?;

    tracing::info!(event_id, name = %new_event.name, "event created");
    Ok((Status::Created, Json(db::load_event(&mut db, event_id).await?)))
}

#[post("/admin/events/<event_id>/phase", format = "json", data = "<request>")]
pub async fn advance_phase(
    mut db: Db,
    cookies: &CookieJar<'_>,
    event_id: i32,
    request: Json<AdvancePhaseRequest>,
) -> ApiResult<Json<Event>> {
    require_admin(cookies, &mut db).await?;

    let event = db::load_event(&mut db, event_id).await?;
    let current = db::event_phase(&event)?;
    rules::check_transition(current, request.phase)?;

    if request.phase == EventPhase::TeamFormation {
        let leaders: i64 = participants::table
            .filter(participants::event_id.eq(event_id))
            .filter(participants::is_leader.eq(true))
            .count()
            .get_result(&mut db)
            .await?;
        if leaders == 0 {
            return Err(ApiError::PreconditionFailed(
                "select leaders before starting team formation".to_string(),
            ));
        }
    }

    // Guarded on the phase we read so two concurrent advances cannot both win
    let updated = diesel::update(
        events::table
            .find(event_id)
            .filter(events::phase.eq(current.as_str())),
    )
    .set(events::phase.eq(request.phase.as_str()))
    .execute(&mut db)
    .await?;
    if updated == 0 {
        return Err(ApiError::Conflict(
            "event phase changed concurrently".to_string(),
        ));
    }

    tracing::info!(event_id, from = %current, to = %request.phase, "event phase advanced");
    Ok(Json(db::load_event(&mut db, event_id).await?))
}

#[post(
    "/admin/events/<event_id>/participants/import",
    format = "json",
    data = "<rows>"
)]
pub async fn import_participants(
    mut db: Db,
    cookies: &CookieJar<'_>,
    event_id: i32,
    rows: Json<Vec<ParticipantInput>>,
) -> ApiResult<Json<ImportReport>> {
    require_admin(cookies, &mut db).await?;
    db::load_event_in_phase(&mut db, event_id, EventPhase::Registration).await?;

    let existing: HashSet<String> = participants::table
        .filter(participants::event_id.eq(event_id))
        .select(participants::email)
        .load::<String>(&mut db)
        .await?
        .into_iter()
        .collect();

    let (new_participants, report) = rules::plan_import(event_id, &rows, existing);

    if !new_participants.is_empty() {
        diesel::insert_into(participants::table)
            .values(&new_participants)
            .execute(&mut db)
            .await?;
    }

    tracing::info!(
        event_id,
        imported = report.imported,
        skipped = report.skipped,
        rejected = report.rejected.len(),
        "participants imported"
    );
    Ok(Json(report))
}
