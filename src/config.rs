//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone `ENV_CONFIG`; las
//! opciones de línea de comandos se aplican encima con `AppConfig::resolve`.
use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use sop_persistence::config::{init_dotenv, DbConfig};

pub const DEFAULT_CATALOG_DIR: &str = "procedimientos";
pub const DEFAULT_REGISTRY_PATH: &str = ".sop_sessions.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Raíz del catálogo (`areas.json` + `<PRO>/nodos.json`).
    pub catalog_dir: PathBuf,
    /// Archivo con la última sesión recordada por procedimiento.
    pub registry_path: PathBuf,
    pub database: DbConfig,
}

/// Configuración tomada del entorno, evaluada una sola vez.
pub static ENV_CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    init_dotenv();
    AppConfig { catalog_dir: path_var("SOP_CATALOG_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DIR)),
                registry_path: path_var("SOP_REGISTRY_PATH").unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH)),
                database: DbConfig::from_env() }
});

/// Opciones de línea de comandos que pisan al entorno.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub catalog_dir: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn resolve(overrides: Overrides) -> Self {
        ENV_CONFIG.clone().with(overrides)
    }

    pub fn with(mut self, overrides: Overrides) -> Self {
        if let Some(dir) = overrides.catalog_dir {
            self.catalog_dir = dir;
        }
        if let Some(path) = overrides.registry_path {
            self.registry_path = path;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        self
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}
