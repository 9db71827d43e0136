use rocket::figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(alias = "DATABASE_URL")]
    pub database_url: String,
    #[serde(alias = "PRESENTER_PASSWORD_HASH")]
    pub presenter_password_hash: String,
    #[serde(default = "default_rocket_port", alias = "ROCKET_PORT")]
    pub rocket_port: u16,
    #[serde(default = "default_max_connections", alias = "MAX_CONNECTIONS")]
    pub max_connections: usize,
    #[serde(default = "default_run_migrations", alias = "RUN_MIGRATIONS")]
    pub run_migrations: bool,
}

fn default_rocket_port() -> u16 {
    8000
}

fn default_max_connections() -> usize {
    64
}

fn default_run_migrations() -> bool {
    true
}

impl AppConfig {
    /// `Config.toml`, then `../Config.toml`, then the environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("Config.toml"))
            .merge(Toml::file("../Config.toml"))
            .merge(Env::raw().only(&[
                "DATABASE_URL",
                "PRESENTER_PASSWORD_HASH",
                "ROCKET_PORT",
                "MAX_CONNECTIONS",
                "RUN_MIGRATIONS",
            ]))
    }

    pub fn load() -> Result<Self, rocket::figment::Error> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, rocket::figment::Error> {
        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let figment = Figment::new()
            .merge(("database_url", "mysql://u:p@localhost/tb"))
            .merge(("presenter_password_hash", "$2b$04$hash"));

        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.database_url, "mysql://u:p@localhost/tb");
        assert_eq!(config.rocket_port, 8000);
        assert_eq!(config.max_connections, 64);
        assert!(config.run_migrations);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let figment = Figment::new()
            .merge(("database_url", "mysql://u:p@db/tb"))
            .merge(("presenter_password_hash", "hash"))
            .merge(("rocket_port", 9100))
            .merge(("run_migrations", false));

        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.rocket_port, 9100);
        assert!(!config.run_migrations);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let figment = Figment::new().merge(("presenter_password_hash", "hash"));
        assert!(AppConfig::from_figment(figment).is_err());
    }
}
