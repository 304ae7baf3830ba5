//! Carga de configuración de conexión desde variables de entorno.
//!
//! - `SOP_DATABASE_URL`: ruta del archivo SQLite (default `sop_sessions.db`).
//! - `SOP_DB_MIN_CONNECTIONS` / `SOP_DB_MAX_CONNECTIONS`: tamaños del pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

pub const DEFAULT_DATABASE_URL: &str = "sop_sessions.db";

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: DEFAULT_DATABASE_URL.to_string(),
               min_connections: 1,
               max_connections: 4 }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        let defaults = Self::default();
        let url = env::var("SOP_DATABASE_URL").ok()
                                              .filter(|v| !v.trim().is_empty())
                                              .unwrap_or(defaults.url);
        let min_connections = parse_var("SOP_DB_MIN_CONNECTIONS").unwrap_or(defaults.min_connections);
        let max_connections = parse_var("SOP_DB_MAX_CONNECTIONS").unwrap_or(defaults.max_connections);
        Self { url,
               min_connections,
               max_connections }
    }
}

fn parse_var(name: &str) -> Option<u32> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
