//! Implementación SQLite (Diesel) del `SessionStore` del core.
//!
//! - Una fila por sesión en `sessions`; las colecciones (`history`,
//!   `decisiones`, `bloqueos`, `inputs`, `logs`) se guardan como JSON en
//!   columnas de texto y los timestamps como RFC 3339 en UTC.
//! - `replace` sobrescribe los campos mutables y `updated_at` (gana la
//!   última escritura, sin versionado).
//! - Errores transitorios (base bloqueada, checkout del pool) se reintentan
//!   con backoff corto.
//! - El bloqueo abierto no se persiste; el core lo re-deriva de la bitácora
//!   al reanudar.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use sop_core::errors::StoreError;
use sop_core::{Session, SessionSnapshot, SessionStatus, SessionStore, SessionUpdate};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::sessions;

/// Pool r2d2 de conexiones SQLite. Al construirlo se corren las migraciones
/// pendientes una sola vez.
pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type SqlitePooledConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o un proveedor de prueba sin acoplar el
/// store a r2d2. Debe devolver una conexión válida o
/// `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<SqlitePooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `SqlitePool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: SqlitePool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<SqlitePooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Pragmas aplicados a cada conexión nueva del pool.
#[derive(Debug, Clone, Copy)]
pub struct SqlitePragmas {
    pub busy_timeout_ms: u32,
}

impl Default for SqlitePragmas {
    fn default() -> Self {
        Self { busy_timeout_ms: 5000 }
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
                                    self.busy_timeout_ms))
            .map_err(r2d2::Error::QueryError)
    }
}

/// Fila leída de `sessions`.
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRow {
    pub id: String,
    pub pro_id: String,
    pub area_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub estado: String,
    pub current_node: String,
    pub history: String,
    pub decisiones: String,
    pub bloqueos: String,
    pub inputs: String,
    pub logs: String,
}

/// Fila para insertar en `sessions`.
#[derive(Insertable, Debug)]
#[diesel(table_name = sessions)]
pub struct NewSessionRow<'a> {
    pub id: &'a str,
    pub pro_id: &'a str,
    pub area_id: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
    pub estado: &'a str,
    pub current_node: &'a str,
}

/// Campos mutables de un reemplazo.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = sessions)]
pub struct SessionChanges<'a> {
    pub updated_at: &'a str,
    pub estado: &'a str,
    pub current_node: &'a str,
    pub history: String,
    pub decisiones: String,
    pub bloqueos: String,
    pub inputs: String,
    pub logs: String,
}

impl<'a> SessionChanges<'a> {
    fn encode(update: &'a SessionUpdate<'a>, updated_at: &'a str) -> Result<Self, PersistenceError> {
        Ok(Self { updated_at,
                  estado: update.estado.as_str(),
                  current_node: update.current_node,
                  history: encode_json("history", &update.history)?,
                  decisiones: encode_json("decisiones", &update.decisiones)?,
                  bloqueos: encode_json("bloqueos", &update.bloqueos)?,
                  inputs: encode_json("inputs", update.inputs)?,
                  logs: encode_json("logs", &update.logs)? })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = PersistenceError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let session_id = Uuid::parse_str(&row.id).map_err(|e| corrupt("id", e))?;
        let estado = row.estado.parse::<SessionStatus>().map_err(|e| corrupt("estado", e))?;
        Ok(Session { session_id,
                     pro_id: row.pro_id,
                     area_id: row.area_id,
                     estado,
                     current_node: row.current_node,
                     history: decode_json("history", &row.history)?,
                     decisiones: decode_json("decisiones", &row.decisiones)?,
                     bloqueos: decode_json("bloqueos", &row.bloqueos)?,
                     inputs: decode_json("inputs", &row.inputs)?,
                     logs: decode_json("logs", &row.logs)?,
                     created_at: decode_ts("created_at", &row.created_at)?,
                     updated_at: decode_ts("updated_at", &row.updated_at)?,
                     block_ts: None })
    }
}

fn corrupt(column: &'static str, e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Corrupt { column,
                                message: e.to_string() }
}

fn encode_json<T: Serialize + ?Sized>(column: &'static str, value: &T) -> Result<String, PersistenceError> {
    serde_json::to_string(value).map_err(|e| corrupt(column, e))
}

fn decode_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> Result<T, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| corrupt(column, e))
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_ts(column: &'static str, raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
                                     .map_err(|e| corrupt(column, e))
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::Busy(_) | PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => crate::error::is_busy_message(msg),
        _ => false,
    }
}

/// Retry simple con backoff lineal corto: hasta 3 reintentos (15ms, 30ms,
/// 45ms), con `warn!` por intento. Sólo repite la unidad de trabajo `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// `SessionStore` durable sobre SQLite.
pub struct SqliteSessionStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> SqliteSessionStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn fetch(&self, session_id: Uuid) -> Result<Option<Session>, PersistenceError> {
        let id = session_id.to_string();
        let row = with_retry(|| {
                      let mut conn = self.provider.connection()?;
                      sessions::table.find(id.as_str())
                                     .select(SessionRow::as_select())
                                     .first(&mut conn)
                                     .optional()
                                     .map_err(PersistenceError::from)
                  })?;
        row.map(Session::try_from).transpose()
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for SqliteSessionStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSessionStore").finish_non_exhaustive()
    }
}

impl<P: ConnectionProvider> SessionStore for SqliteSessionStore<P> {
    fn create(&mut self, pro_id: &str, area_id: &str, start_node: &str) -> Result<Session, StoreError> {
        let session = Session::new(pro_id, area_id, start_node, Utc::now());
        let id = session.session_id.to_string();
        let ts = encode_ts(session.created_at);
        let row = NewSessionRow { id: &id,
                                  pro_id,
                                  area_id,
                                  created_at: &ts,
                                  updated_at: &ts,
                                  estado: session.estado.as_str(),
                                  current_node: start_node };
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(sessions::table).values(&row)
                                                .execute(&mut conn)
                                                .map_err(PersistenceError::from)
        }).map_err(|e| {
              error!("session create failed pro={pro_id}: {e}");
              StoreError::from(e)
          })?;
        debug!("session row inserted id={id} pro={pro_id} node={start_node}");
        Ok(session)
    }

    fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        debug!("session get id={session_id}");
        self.fetch(session_id).map_err(|e| {
                                  error!("session get failed id={session_id}: {e}");
                                  StoreError::from(e)
                              })
    }

    fn replace(&mut self, session_id: Uuid, update: &SessionUpdate<'_>) -> Result<DateTime<Utc>, StoreError> {
        let updated_at = Utc::now();
        let ts = encode_ts(updated_at);
        let changes = SessionChanges::encode(update, &ts)?;
        let id = session_id.to_string();
        let affected = with_retry(|| {
                           let mut conn = self.provider.connection()?;
                           diesel::update(sessions::table.find(id.as_str())).set(&changes)
                                                                   .execute(&mut conn)
                                                                   .map_err(PersistenceError::from)
                       }).map_err(|e| {
                             error!("session replace failed id={session_id}: {e}");
                             StoreError::from(e)
                         })?;
        if affected == 0 {
            return Err(StoreError::NotFound(session_id));
        }
        debug!("session row replaced id={session_id} node={} estado={}",
               update.current_node,
               update.estado);
        Ok(updated_at)
    }

    fn export(&self, session_id: Uuid) -> Result<SessionSnapshot, StoreError> {
        let session = self.get(session_id)?.ok_or(StoreError::NotFound(session_id))?;
        Ok(SessionSnapshot::new(session, Utc::now()))
    }
}

/// Construye un pool SQLite y corre las migraciones pendientes.
///
/// - Tamaños en cero se elevan a 1; si `min_size > max_size` se usa
///   `min = max`.
/// - Cada conexión aplica `SqlitePragmas` al ser creada.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<SqlitePool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .connection_customizer(Box::new(SqlitePragmas::default()))
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    debug!("sqlite pool ready url={database_url} min={final_min} max={validated_max}");
    Ok(pool)
}

/// Atajo: store listo sobre un pool nuevo.
pub fn open_store(database_url: &str, min_size: u32, max_size: u32) -> Result<SqliteSessionStore<PoolProvider>, PersistenceError> {
    let pool = build_pool(database_url, min_size, max_size)?;
    Ok(SqliteSessionStore::new(PoolProvider { pool }))
}
