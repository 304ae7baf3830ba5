//! Runner de migraciones embebidas.
//!
//! Las migraciones viven en `migrations/` dentro de este crate y se ejecutan
//! una vez al construir el pool.

use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending_migrations(conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| log::debug!("migrations applied: {}", applied.len()))
        .map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))
}
