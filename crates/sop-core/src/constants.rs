//! Constantes del motor de procedimientos.
//!
//! Valores literales que forman parte del contrato con los datos de
//! procedimientos (`areas.json`, `nodos.json`) y con la trazabilidad
//! exportada. Cambiarlos altera la interpretación de catálogos existentes.

/// Marca (comparada en minúsculas) que exime a un ítem de checklist del
/// requisito de completitud.
pub const CHECKLIST_EXEMPT_MARKER: &str = "si aplica";

/// Motivo de bloqueo comodín: si se selecciona, el detalle es obligatorio.
pub const CATCH_ALL_REASON: &str = "Otro";

/// Nodo de fin al que salta un STOP cuando el procedimiento no declara otro.
pub const DEFAULT_STOP_NODE: &str = "END_STOP";

/// Estado final mostrado en nodos `end` sin `estado_final`.
pub const DEFAULT_FINAL_STATUS: &str = "FINALIZADO";

/// Largo del prefijo del `session_id` usado en nombres de archivo.
pub const SESSION_PREFIX_LEN: usize = 8;
