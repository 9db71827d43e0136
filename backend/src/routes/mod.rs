// Routes module - organizes all HTTP route handlers

pub mod registration;
pub mod session;
pub mod teams;
pub mod voting;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Route};

use crate::error::ErrorBody;
use crate::models::HealthResponse;

pub fn routes() -> Vec<Route> {
    routes![
        health,
        session::admin_login,
        session::admin_logout,
        session::admin_check,
        registration::admin::create_event,
        registration::admin::advance_phase,
        registration::admin::import_participants,
        registration::client::list_events,
        registration::client::get_event,
        registration::client::register_participant,
        registration::client::list_participants,
        registration::client::list_unassigned,
        registration::client::list_tags,
        voting::client::cast_vote,
        voting::client::get_vote_status,
        voting::client::list_leaders,
        voting::admin::get_results,
        voting::admin::select_leaders,
        teams::client::create_team,
        teams::client::list_teams,
        teams::client::get_team,
        teams::client::join_team,
        teams::client::leave_team,
        teams::client::confirm_team,
        teams::admin::export_teams_excel,
    ]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![not_found, unprocessable, default_catcher]
}

#[get("/health")]
pub fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "teambuilder-backend",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[catch(404)]
pub fn not_found(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    (
        Status::NotFound,
        Json(ErrorBody::new(
            "not_found",
            format!("no route for {} {}", req.method(), req.uri()),
        )),
    )
}

/// Rocket answers 422 when a JSON body does not match the request type.
#[catch(422)]
pub fn unprocessable() -> (Status, Json<ErrorBody>) {
    (
        Status::UnprocessableEntity,
        Json(ErrorBody::new(
            "unprocessable_entity",
            "request body is malformed or missing required fields",
        )),
    )
}

#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let kind = match status.code {
        400 => "bad_request",
        401 => "unauthorized",
        503 => "service_unavailable",
        code if code >= 500 => "internal_error",
        _ => "error",
    };
    (
        status,
        Json(ErrorBody::new(kind, status.reason_lossy().to_string())),
    )
}
