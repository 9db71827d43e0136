//! REST backend for a hackathon-style team building event.
//!
//! Participants register into an event, vote for a peer leader inside their
//! interest-tag group, the top-ranked participants become leaders, and
//! leaders assemble teams of up to four that are then confirmed.

#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod rules;
pub mod schema;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_db_pools::Database;

pub use config::AppConfig;
use db::TeamBuilderDB;

/// Shared state managed by Rocket.
pub struct AppState {
    pub presenter_password_hash: String,
}

/// Assemble the Rocket instance: pool, optional migrations, routes, catchers.
pub fn build(config: AppConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("port", config.rocket_port))
        .merge((
            "databases.teambuilder_db",
            rocket_db_pools::Config {
                url: config.database_url.clone(),
                min_connections: None,
                max_connections: config.max_connections,
                connect_timeout: 3,
                idle_timeout: None,
                extensions: None,
            },
        ));

    let mut rocket = rocket::custom(figment)
        .manage(AppState {
            presenter_password_hash: config.presenter_password_hash.clone(),
        })
        .attach(TeamBuilderDB::init());

    if config.run_migrations {
        let database_url = config.database_url.clone();
        rocket = rocket.attach(AdHoc::try_on_ignite("Database Migrations", move |rocket| {
            db::run_migrations(rocket, database_url)
        }));
    }

    rocket
        .mount("/api", routes::routes())
        .register("/", routes::catchers())
}
