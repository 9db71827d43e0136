use diesel::result::{DatabaseErrorKind, Error};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket_db_pools::diesel::prelude::*;

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ConfirmTeamRequest, CreateTeamRequest, EventPhase, JoinTeamRequest, NewTeam, NewTeamMember,
    Team, TeamWithMembers,
};
use crate::routes::teams::{team_with_members, with_members};
use crate::rules;
use crate::schema::{team_members, teams};

const MAX_TEAM_NAME_LEN: usize = 150;

/// Load a team and make sure its event is still forming teams.
async fn load_open_team(db: &mut Db, team_id: i32) -> ApiResult<Team> {
    let team = db::load_team(db, team_id).await?;
    db::load_event_in_phase(db, team.event_id, EventPhase::TeamFormation).await?;
    Ok(team)
}

// A selected leader opens a team and becomes its first member
#[post("/events/<event_id>/teams", format = "json", data = "<request>")]
pub async fn create_team(
    mut db: Db,
    event_id: i32,
    request: Json<CreateTeamRequest>,
) -> ApiResult<(Status, Json<TeamWithMembers>)> {
    db::load_event_in_phase(&mut db, event_id, EventPhase::TeamFormation).await?;

    let leader = db::load_participant(&mut db, event_id, request.leader_id).await?;
    let on_team = db::is_on_team(&mut db, leader.id).await?;
    rules::check_team_leader(&leader, on_team)?;

    let name = match request.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Team {}", leader.name),
    };
    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "team name must be at most {MAX_TEAM_NAME_LEN} characters"
        )));
    }

    let result = diesel::insert_into(teams::table)
        .values(&NewTeam {
            event_id,
            name,
            leader_id: leader.id,
        })
        .execute(&mut db)
        .await;
    match result {
        Ok(_) => {}
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(ApiError::Conflict(format!(
                "participant {} already leads a team",
                leader.id
            )));
        }
        Err(e) => return Err(e.into()),
    }
    let team_id = db::last_insert_id(&mut db).await?;

    let result = diesel::insert_into(team_members::table)
        .values(&NewTeamMember {
            team_id,
            participant_id: leader.id,
        })
        .execute(&mut db)
        .await;
    if let Err(e) = result {
        // A team is never left without its leader as a member
        diesel::delete(teams::table.find(team_id))
            .execute(&mut db)
            .await?;
        tracing::debug!(event_id, team_id, leader = leader.id, "team creation rolled back");
        return Err(match e {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => ApiError::Conflict(
                format!("participant {} is already on a team", leader.id),
            ),
            other => other.into(),
        });
    }

    tracing::info!(event_id, team_id, leader = leader.id, "team created");

    let team = db::load_team(&mut db, team_id).await?;
    Ok((Status::Created, Json(team_with_members(&mut db, team).await?)))
}

#[get("/events/<event_id>/teams")]
pub async fn list_teams(mut db: Db, event_id: i32) -> ApiResult<Json<Vec<TeamWithMembers>>> {
    db::load_event(&mut db, event_id).await?;

    let event_teams = teams::table
        .filter(teams::event_id.eq(event_id))
        .order(teams::id.asc())
        .select(Team::as_select())
        .load(&mut db)
        .await?;

    Ok(Json(with_members(&mut db, event_teams).await?))
}

#[get("/teams/<team_id>")]
pub async fn get_team(mut db: Db, team_id: i32) -> ApiResult<Json<TeamWithMembers>> {
    let team = db::load_team(&mut db, team_id).await?;
    Ok(Json(team_with_members(&mut db, team).await?))
}

#[post("/teams/<team_id>/members", format = "json", data = "<request>")]
pub async fn join_team(
    mut db: Db,
    team_id: i32,
    request: Json<JoinTeamRequest>,
) -> ApiResult<Json<TeamWithMembers>> {
    let team = load_open_team(&mut db, team_id).await?;
    let participant = db::load_participant(&mut db, team.event_id, request.participant_id).await?;

    let member_count = db::count_members(&mut db, team.id).await?;
    let on_team = db::is_on_team(&mut db, participant.id).await?;
    rules::check_join(&team, member_count, on_team)?;

    let result = diesel::insert_into(team_members::table)
        .values(&NewTeamMember {
            team_id: team.id,
            participant_id: participant.id,
        })
        .execute(&mut db)
        .await;
    match result {
        Ok(_) => {}
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(ApiError::Conflict(
                "participant is already on a team".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    // A concurrent join may have taken the last seat between count and insert
    let row_id = db::last_insert_id(&mut db).await?;
    let seat = db::seat_of(&mut db, team.id, row_id).await?;
    if let Err(full) = rules::check_seat(seat) {
        diesel::delete(team_members::table.find(row_id))
            .execute(&mut db)
            .await?;
        return Err(full);
    }

    tracing::info!(team_id, participant = participant.id, "participant joined team");
    Ok(Json(team_with_members(&mut db, team).await?))
}

#[delete("/teams/<team_id>/members/<participant_id>")]
pub async fn leave_team(
    mut db: Db,
    team_id: i32,
    participant_id: i32,
) -> ApiResult<Json<TeamWithMembers>> {
    let team = load_open_team(&mut db, team_id).await?;
    rules::check_leave(&team, participant_id)?;

    let removed = diesel::delete(
        team_members::table
            .filter(team_members::team_id.eq(team.id))
            .filter(team_members::participant_id.eq(participant_id)),
    )
    .execute(&mut db)
    .await?;
    if removed == 0 {
        return Err(ApiError::NotFound(format!(
            "participant {participant_id} is not a member of team {team_id}"
        )));
    }

    tracing::info!(team_id, participant = participant_id, "participant left team");
    Ok(Json(team_with_members(&mut db, team).await?))
}

#[post("/teams/<team_id>/confirm", format = "json", data = "<request>")]
pub async fn confirm_team(
    mut db: Db,
    team_id: i32,
    request: Json<ConfirmTeamRequest>,
) -> ApiResult<Json<TeamWithMembers>> {
    let team = load_open_team(&mut db, team_id).await?;
    let member_count = db::count_members(&mut db, team.id).await?;
    rules::check_confirm(&team, request.leader_id, member_count)?;

    let updated = diesel::update(
        teams::table
            .find(team.id)
            .filter(teams::confirmed.eq(false)),
    )
    .set(teams::confirmed.eq(true))
    .execute(&mut db)
    .await?;
    if updated == 0 {
        return Err(ApiError::Conflict("team is already confirmed".to_string()));
    }

    tracing::info!(team_id, members = member_count, "team confirmed");
    let team = db::load_team(&mut db, team_id).await?;
    Ok(Json(team_with_members(&mut db, team).await?))
}
