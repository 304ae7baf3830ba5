//! sop-persistence
//!
//! Session Store durable para el motor de procedimientos: implementación
//! SQLite (Diesel + r2d2) del trait `SessionStore` de `sop-core`, más
//! utilidades de conexión y migraciones.
//!
//! Módulos:
//! - `sqlite`: store sobre la tabla `sessions`, pool y reintentos.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use sqlite::{build_pool, open_store, ConnectionProvider, PoolProvider, SqlitePool, SqliteSessionStore};
