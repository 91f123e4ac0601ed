use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Process-wide configuration, loaded once from defaults and the environment.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().unwrap_or_else(|e| {
        eprintln!("invalid configuration, falling back to defaults: {e}");
        Config::default()
    })
});

/// Posts shown per page on the index.
pub const POSTS_PER_PAGE: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// sqlx connection string, e.g. `sqlite://blog.db`.
    pub database_url: String,
    /// Secret the session cookie key is derived from.
    pub session_secret: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Mark session and flash cookies `Secure`.
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://blog.db".to_string(),
            session_secret: "dev_secret_key".to_string(),
            listen_addr: "0.0.0.0:5000".to_string(),
            loglevel: "info".to_string(),
            secure_cookies: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with `DATABASE_URL`, `SESSION_SECRET`, `LISTEN_ADDR`,
    /// `LOGLEVEL` and `SECURE_COOKIES`.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(&[
                "database_url",
                "session_secret",
                "listen_addr",
                "loglevel",
                "secure_cookies",
            ]))
            .extract()
    }
}
