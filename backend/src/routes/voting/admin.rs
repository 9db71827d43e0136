use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket_db_pools::diesel::prelude::*;

use crate::db::{self, Db};
use crate::error::ApiResult;
use crate::models::{CandidateResult, EventPhase, LeaderSelectionResponse, Participant};
use crate::routes::session::require_admin;
use crate::rules;
use crate::schema::{participants, votes};

/// Every participant of the event with received votes, ranked.
async fn ranked_candidates(
    db: &mut Db,
    event_id: i32,
) -> ApiResult<(Vec<Participant>, Vec<CandidateResult>)> {
    let all_participants = participants::table
        .filter(participants::event_id.eq(event_id))
        .order(participants::id.asc())
        .select(Participant::as_select())
        .load(db)
        .await?;

    let candidate_ids = votes::table
        .filter(votes::event_id.eq(event_id))
        .select(votes::candidate_id)
        .load::<i32>(db)
        .await?;

    let ranked = rules::rank_candidates(&all_participants, &rules::tally_votes(candidate_ids));
    Ok((all_participants, ranked))
}

// Route to get voting results
#[get("/admin/events/<event_id>/results")]
pub async fn get_results(
    mut db: Db,
    cookies: &CookieJar<'_>,
    event_id: i32,
) -> ApiResult<Json<Vec<CandidateResult>>> {
    require_admin(cookies, &mut db).await?;
    db::load_event(&mut db, event_id).await?;

    let (_, ranked) = ranked_candidates(&mut db, event_id).await?;
    Ok(Json(ranked))
}

// Route to pick the top-ranked participants as leaders
#[post("/admin/events/<event_id>/leaders/select")]
pub async fn select_leaders(
    mut db: Db,
    cookies: &CookieJar<'_>,
    event_id: i32,
) -> ApiResult<Json<LeaderSelectionResponse>> {
    require_admin(cookies, &mut db).await?;
    db::load_event_in_phase(&mut db, event_id, EventPhase::Voting).await?;

    let (all_participants, ranked) = ranked_candidates(&mut db, event_id).await?;
    let selection = rules::select_leaders(&ranked);

    diesel::update(participants::table.filter(participants::event_id.eq(event_id)))
        .set(participants::is_leader.eq(false))
        .execute(&mut db)
        .await?;

    if !selection.leader_ids.is_empty() {
        diesel::update(
            participants::table
                .filter(participants::event_id.eq(event_id))
                .filter(participants::id.eq_any(selection.leader_ids.clone())),
        )
        .set(participants::is_leader.eq(true))
        .execute(&mut db)
        .await?;
    }

    let leaders: Vec<Participant> = selection
        .leader_ids
        .iter()
        .filter_map(|id| all_participants.iter().find(|p| p.id == *id))
        .map(|p| Participant {
            is_leader: true,
            ..p.clone()
        })
        .collect();

    tracing::info!(
        event_id,
        participants = all_participants.len(),
        leaders = leaders.len(),
        threshold = ?selection.threshold,
        "leaders selected"
    );

    Ok(Json(LeaderSelectionResponse {
        leader_count: leaders.len(),
        threshold: selection.threshold,
        leaders,
    }))
}
