//! Runtime configuration: built-in defaults overridden by `PORTAL_*` environment variables.

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Lifetime of a session issued at login.
    pub session_ttl_hours: i64,
    /// Base64-encoded master key (>= 64 bytes) for the encrypted session cookie.
    pub cookie_key: Option<String>,
    /// Drop the `Secure` cookie flag, for plain-http local setups.
    pub insecure_cookie: bool,
    pub admin_email: String,
    pub admin_password: String,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./edu.db".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            loglevel: "info".to_string(),
            session_ttl_hours: 24,
            cookie_key: None,
            insecure_cookie: false,
            admin_email: "admin@edu.com".to_string(),
            admin_password: "admin123".to_string(),
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
            argon2_parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("PORTAL_"))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }
}
