use std::net::IpAddr;

use bcrypt::verify;
use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::diesel::prelude::*;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AdminLoginRequest, AdminSession, NewAdminSession};
use crate::schema::admin_sessions;
use crate::AppState;

const ADMIN_COOKIE: &str = "admin_auth";
const SESSION_HOURS: i64 = 12;

/// Fails with 401 unless the request carries a live admin session cookie.
pub async fn require_admin(cookies: &CookieJar<'_>, db: &mut Db) -> ApiResult<()> {
    let Some(cookie) = cookies.get(ADMIN_COOKIE) else {
        return Err(ApiError::Unauthorized);
    };

    let session = admin_sessions::table
        .find(cookie.value())
        .select(AdminSession::as_select())
        .first(db)
        .await
        .optional()?;

    let now = Utc::now().naive_utc();
    match session {
        Some(session) if session.expires_at.map_or(true, |expires| expires > now) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

#[post("/admin/login", format = "json", data = "<login>")]
pub async fn admin_login(
    mut db: Db,
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    client_ip: Option<IpAddr>,
    login: Json<AdminLoginRequest>,
) -> ApiResult<Status> {
    if !verify(&login.password, &state.presenter_password_hash).unwrap_or(false) {
        // Clear any existing invalid cookie
        cookies.remove(Cookie::from(ADMIN_COOKIE));
        tracing::warn!(ip = ?client_ip, "rejected admin login");
        return Err(ApiError::Unauthorized);
    }

    let token = Uuid::new_v4().to_string();
    let new_session = NewAdminSession {
        session_token: token.clone(),
        expires_at: Some(Utc::now().naive_utc() + Duration::hours(SESSION_HOURS)),
        ip_address: client_ip.map(|ip| ip.to_string()),
    };

    diesel::insert_into(admin_sessions::table)
        .values(&new_session)
        .execute(&mut db)
        .await?;

    let mut cookie = Cookie::new(ADMIN_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookies.add(cookie);

    tracing::info!(ip = ?client_ip, "admin logged in");
    Ok(Status::Ok)
}

#[post("/admin/logout")]
pub async fn admin_logout(mut db: Db, cookies: &CookieJar<'_>) -> ApiResult<Status> {
    if let Some(cookie) = cookies.get(ADMIN_COOKIE) {
        diesel::delete(admin_sessions::table.find(cookie.value()))
            .execute(&mut db)
            .await?;
        cookies.remove(Cookie::from(ADMIN_COOKIE));
    }
    Ok(Status::Ok)
}

#[get("/admin/check")]
pub async fn admin_check(mut db: Db, cookies: &CookieJar<'_>) -> Json<bool> {
    Json(require_admin(cookies, &mut db).await.is_ok())
}
