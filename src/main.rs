//! sop - recorrido de procedimientos (SOP) desde la terminal.
//!
//! Cada invocación reanuda la última sesión recordada del procedimiento (o
//! crea una), aplica una acción y muestra el nodo resultante.
//!
//! Códigos de salida: 3 validación rechazada, 4 procedimiento/nodo no
//! encontrado, 5 error del store o del registro local.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sop_core::{Applied, EngineError, ExportArtifact, FormSnapshot, FsCatalog, GraphError, GraphProvider, JsonFileRegistry, NodeKind, SessionController, SessionInit, StoreError};
use sop_persistence::{PersistenceError, PoolProvider, SqliteSessionStore};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{AppConfig, Overrides};

type Controller = SessionController<SqliteSessionStore<PoolProvider>, JsonFileRegistry>;

/// sop - recorrido interactivo de procedimientos operativos
#[derive(Parser, Debug)]
#[command(name = "sop")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Raíz del catálogo de procedimientos (env: SOP_CATALOG_DIR)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Archivo SQLite de sesiones (env: SOP_DATABASE_URL)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Registro local de la última sesión por procedimiento (env: SOP_REGISTRY_PATH)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Filtro de logs (trace, debug, info, warn, error); RUST_LOG tiene prioridad
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct Target {
    /// Id del procedimiento (p. ej. PRO141)
    pro_id: String,

    /// Área de la sesión nueva (por defecto, la que lista al procedimiento)
    #[arg(long)]
    area: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Muestra el nodo actual, el avance y el recorrido
    Show {
        #[command(flatten)]
        target: Target,
        /// Imprime el estado como JSON
        #[arg(long)]
        json: bool,
    },

    /// Avanza el paso actual con los datos del formulario
    Advance {
        #[command(flatten)]
        target: Target,
        /// Valor de un campo, `key=valor` (repetible)
        #[arg(long = "set", value_parser = parse_key_val)]
        values: Vec<(String, String)>,
        /// Marca el ítem N del checklist (1-based, repetible)
        #[arg(long = "check")]
        checked: Vec<usize>,
        /// Marca todos los ítems del checklist
        #[arg(long)]
        check_all: bool,
        /// Elige la opción N de una decisión (1-based)
        #[arg(long, conflicts_with = "choose")]
        option: Option<usize>,
        /// Elige una opción por su etiqueta
        #[arg(long)]
        choose: Option<String>,
        /// Carpeta donde escribir la exportación al avanzar un nodo final
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Rechaza (bloquea) el paso actual
    Reject {
        #[command(flatten)]
        target: Target,
    },

    /// Resuelve el bloqueo con motivos y rehace el paso
    Redo {
        #[command(flatten)]
        target: Target,
        /// Motivo de bloqueo (repetible)
        #[arg(long = "motivo")]
        motivos: Vec<String>,
        /// Detalle (obligatorio con "Otro")
        #[arg(long, default_value = "")]
        detalle: String,
    },

    /// Vuelve al paso anterior
    Back {
        #[command(flatten)]
        target: Target,
    },

    /// Detiene el procedimiento (requiere --yes)
    Stop {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        yes: bool,
    },

    /// Descarta la sesión y empieza de nuevo (requiere --yes)
    Reset {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        yes: bool,
    },

    /// Exporta la trazabilidad completa como JSON
    Export {
        #[command(flatten)]
        target: Target,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Resumen de campos, decisiones y bloqueos
    Summary {
        #[command(flatten)]
        target: Target,
    },
}

impl Command {
    fn target(&self) -> &Target {
        match self {
            Command::Show { target, .. }
            | Command::Advance { target, .. }
            | Command::Reject { target }
            | Command::Redo { target, .. }
            | Command::Back { target }
            | Command::Stop { target, .. }
            | Command::Reset { target, .. }
            | Command::Export { target, .. }
            | Command::Summary { target } => target,
        }
    }
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw.split_once('=')
                          .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))
                                                  .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(filter)
                                  .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
                                  .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return match engine {
            EngineError::Rejected(_) => 3,
            EngineError::NodeNotFound(_) | EngineError::Graph(_) => 4,
            EngineError::Store(_) | EngineError::Registry(_) => 5,
        };
    }
    if err.downcast_ref::<GraphError>().is_some() {
        return 4;
    }
    if err.downcast_ref::<PersistenceError>().is_some() || err.downcast_ref::<StoreError>().is_some() {
        return 5;
    }
    1
}

fn run(cli: Cli) -> Result<()> {
    let cfg = AppConfig::resolve(Overrides { catalog_dir: cli.catalog.clone(),
                                             registry_path: cli.registry.clone(),
                                             database_url: cli.db.clone() });
    debug!("config {:?}", cfg);
    let mut ctl = open(&cfg, cli.command.target())?;

    match cli.command {
        Command::Show { json, .. } => {
            if json {
                print_json(&ctl)?;
            } else {
                print_node(&ctl)?;
                println!("\n{}", render::timeline_view(&ctl.timeline()));
            }
        }
        Command::Advance { values,
                           checked,
                           check_all,
                           option,
                           choose,
                           out,
                           .. } => {
            let form = build_form(&ctl, values, checked, check_all, option, choose)?;
            let applied = ctl.advance(form)?;
            report(&ctl, applied, &out)?;
        }
        Command::Reject { .. } => {
            let applied = ctl.reject()?;
            report(&ctl, applied, Path::new("."))?;
        }
        Command::Redo { motivos, detalle, .. } => {
            ctl.resolve_block(motivos, &detalle)?;
            print_node(&ctl)?;
        }
        Command::Back { .. } => {
            ctl.go_back()?;
            print_node(&ctl)?;
        }
        Command::Stop { yes, .. } => {
            if !yes {
                bail!("stop discards the remaining steps; confirm with --yes");
            }
            ctl.stop()?;
            print_node(&ctl)?;
        }
        Command::Reset { yes, .. } => {
            if !yes {
                bail!("reset starts a new session; confirm with --yes");
            }
            // Sin sesión recordada, `open` ya creó una en el nodo inicial.
            if ctl.init() == SessionInit::Resumed {
                ctl.reset()?;
            }
            print_node(&ctl)?;
        }
        Command::Export { out, .. } => {
            let artifact = ctl.export()?;
            write_artifact(&artifact, &out)?;
        }
        Command::Summary { .. } => {
            println!("{}", render::summary_view(&ctl.summary()));
        }
    }
    Ok(())
}

fn open(cfg: &AppConfig, target: &Target) -> Result<Controller> {
    let catalog = FsCatalog::open(&cfg.catalog_dir).with_context(|| format!("opening catalog {}", cfg.catalog_dir.display()))?;
    let procedure = catalog.load(&target.pro_id)?;
    let area_id = target.area
                        .clone()
                        .or_else(|| catalog.catalog().area_of(&target.pro_id).map(|a| a.id.clone()))
                        .unwrap_or_default();

    let store = sop_persistence::open_store(&cfg.database.url, cfg.database.min_connections, cfg.database.max_connections)
        .with_context(|| format!("opening session database {}", cfg.database.url))?;
    let registry = JsonFileRegistry::open(&cfg.registry_path).map_err(EngineError::from)?;

    let ctl = SessionController::start(procedure, area_id, store, registry)?;
    match ctl.init() {
        SessionInit::Resumed => info!("resumed session {} for {}", ctl.session().session_id, target.pro_id),
        SessionInit::Fresh => info!("created session {} for {}", ctl.session().session_id, target.pro_id),
    }
    Ok(ctl)
}

fn build_form(ctl: &Controller,
              values: Vec<(String, String)>,
              checked: Vec<usize>,
              check_all: bool,
              option: Option<usize>,
              choose: Option<String>)
              -> Result<FormSnapshot> {
    let node = ctl.current_node()?;
    let mut form = FormSnapshot::new();
    form.values.extend(values);
    for n in checked {
        let index = n.checked_sub(1).ok_or_else(|| anyhow!("checklist items are numbered from 1"))?;
        form.checked.insert(index);
    }
    if let (true, NodeKind::Task(task)) = (check_all, &node.kind) {
        form = form.check_all(task.checklist.len());
    }
    form.selected = match (option, choose, &node.kind) {
        (Some(n), _, _) => Some(n.checked_sub(1).ok_or_else(|| anyhow!("options are numbered from 1"))?),
        (None, Some(label), NodeKind::Decision(decision)) => {
            Some(decision.option_index(&label).ok_or_else(|| anyhow!("no option labelled '{label}'"))?)
        }
        _ => None,
    };
    Ok(form)
}

fn report(ctl: &Controller, applied: Applied, out: &Path) -> Result<()> {
    match applied {
        Applied::Moved => print_node(ctl),
        Applied::Unchanged => {
            println!("sin cambios: el paso ya está bloqueado");
            Ok(())
        }
        Applied::Exported(artifact) => write_artifact(&artifact, out),
    }
}

fn print_node(ctl: &Controller) -> Result<()> {
    let node = ctl.current_node()?;
    println!("{}\n", render::header(ctl.procedure(), ctl.session(), &ctl.progress()));
    println!("{}", render::node_view(ctl.procedure(), ctl.session(), node));
    Ok(())
}

fn print_json(ctl: &Controller) -> Result<()> {
    let state = serde_json::json!({
        "session": ctl.session(),
        "blocked": ctl.session().is_blocked(),
        "progress": ctl.progress(),
        "timeline": ctl.timeline(),
    });
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn write_artifact(artifact: &ExportArtifact, out: &Path) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let path = out.join(&artifact.filename);
    fs::write(&path, artifact.to_pretty_json()?).with_context(|| format!("writing {}", path.display()))?;
    println!("exportado: {}", path.display());
    Ok(())
}
