//! Módulo de hashing y canonicalización JSON.
//!
//! Se usa para fijar la `definition_hash` de un procedimiento: el mismo
//! grafo, orden y motivos producen siempre el mismo hash, sin importar el
//! orden de las keys en el documento de origen.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};
