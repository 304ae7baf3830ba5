//! Esquema Diesel de la tabla `sessions`. Reemplazable con `diesel print-schema`.

diesel::table! {
    sessions (id) {
        id -> Text,
        pro_id -> Text,
        area_id -> Text,
        created_at -> Text,
        updated_at -> Text,
        estado -> Text,
        current_node -> Text,
        history -> Text,
        decisiones -> Text,
        bloqueos -> Text,
        inputs -> Text,
        logs -> Text,
    }
}
