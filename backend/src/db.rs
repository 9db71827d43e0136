// Database pool, migrations and shared lookups

use diesel::Connection as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::fairing;
use rocket::{Build, Rocket};
use rocket_db_pools::diesel::prelude::*;
use rocket_db_pools::diesel::MysqlPool;
use rocket_db_pools::{Connection, Database};

use crate::error::{ApiError, ApiResult};
use crate::models::{Event, EventPhase, Participant, Team};
use crate::schema::{events, participants, team_members, teams};

#[derive(Database)]
#[database("teambuilder_db")]
pub struct TeamBuilderDB(MysqlPool);

pub type Db = Connection<TeamBuilderDB>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run pending migrations on a dedicated synchronous connection.
pub async fn run_migrations(rocket: Rocket<Build>, database_url: String) -> fairing::Result {
    let result = rocket::tokio::task::spawn_blocking(move || -> Result<Vec<String>, String> {
        let mut conn = diesel::MysqlConnection::establish(&database_url)
            .map_err(|e| format!("failed to establish connection: {e}"))?;

        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| format!("failed to run migrations: {e}"))?
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        Ok(versions)
    })
    .await;

    match result {
        Ok(Ok(versions)) if versions.is_empty() => {
            tracing::info!("database schema is up to date");
            Ok(rocket)
        }
        Ok(Ok(versions)) => {
            for version in &versions {
                tracing::info!(%version, "applied migration");
            }
            Ok(rocket)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "database migration failed");
            Err(rocket)
        }
        Err(e) => {
            tracing::error!(error = %e, "migration task panicked");
            Err(rocket)
        }
    }
}

/// MySQL has no RETURNING; the id comes from the same pooled connection.
pub async fn last_insert_id(db: &mut Db) -> ApiResult<i32> {
    let id = diesel::select(diesel::dsl::sql::<
        diesel::sql_types::Unsigned<diesel::sql_types::BigInt>,
    >("LAST_INSERT_ID()"))
    .get_result::<u64>(db)
    .await?;
    i32::try_from(id).map_err(|_| ApiError::Internal(format!("inserted id {id} out of range")))
}

pub async fn load_event(db: &mut Db, event_id: i32) -> ApiResult<Event> {
    events::table
        .find(event_id)
        .select(Event::as_select())
        .first(db)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("event {event_id} not found")))
}

pub fn event_phase(event: &Event) -> ApiResult<EventPhase> {
    event
        .phase
        .parse()
        .map_err(|e| ApiError::Internal(format!("event {}: {e}", event.id)))
}

/// Load an event and fail with 412 unless it is in `expected`.
pub async fn load_event_in_phase(
    db: &mut Db,
    event_id: i32,
    expected: EventPhase,
) -> ApiResult<Event> {
    let event = load_event(db, event_id).await?;
    crate::rules::require_phase(event_phase(&event)?, expected)?;
    Ok(event)
}

pub async fn load_participant(
    db: &mut Db,
    event_id: i32,
    participant_id: i32,
) -> ApiResult<Participant> {
    participants::table
        .find(participant_id)
        .filter(participants::event_id.eq(event_id))
        .select(Participant::as_select())
        .first(db)
        .await
        .optional()?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "participant {participant_id} not found in event {event_id}"
            ))
        })
}

pub async fn load_team(db: &mut Db, team_id: i32) -> ApiResult<Team> {
    teams::table
        .find(team_id)
        .select(Team::as_select())
        .first(db)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("team {team_id} not found")))
}

pub async fn count_members(db: &mut Db, team_id: i32) -> ApiResult<usize> {
    let count: i64 = team_members::table
        .filter(team_members::team_id.eq(team_id))
        .count()
        .get_result(db)
        .await?;
    Ok(count as usize)
}

/// Position of membership row `row_id` among the team's rows, counting from 1.
pub async fn seat_of(db: &mut Db, team_id: i32, row_id: i32) -> ApiResult<usize> {
    let count: i64 = team_members::table
        .filter(team_members::team_id.eq(team_id))
        .filter(team_members::id.le(row_id))
        .count()
        .get_result(db)
        .await?;
    Ok(count as usize)
}

pub async fn is_on_team(db: &mut Db, participant_id: i32) -> ApiResult<bool> {
    let count: i64 = team_members::table
        .filter(team_members::participant_id.eq(participant_id))
        .count()
        .get_result(db)
        .await?;
    Ok(count > 0)
}

pub async fn load_members(db: &mut Db, team_ids: Vec<i32>) -> ApiResult<Vec<(i32, Participant)>> {
    Ok(team_members::table
        .inner_join(participants::table)
        .filter(team_members::team_id.eq_any(team_ids))
        .order(team_members::id.asc())
        .select((team_members::team_id, Participant::as_select()))
        .load::<(i32, Participant)>(db)
        .await?)
}
