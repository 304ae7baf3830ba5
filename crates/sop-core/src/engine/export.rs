//! Artefacto de exportación descargable.
use serde::Serialize;

use crate::procedure::Procedure;
use crate::repo::SessionSnapshot;

/// Documento exportado: instantánea del store más la identificación del
/// procedimiento y el hash de su definición.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    pub proceso: String,
    pub definition_hash: String,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// `<pro_id>_<prefijo de session_id>.json`
    pub filename: String,
    pub document: ExportDocument,
}

impl ExportArtifact {
    pub fn new(procedure: &Procedure, snapshot: SessionSnapshot) -> Self {
        let filename = format!("{}_{}.json", snapshot.session.pro_id, snapshot.session.short_id());
        Self { filename,
               document: ExportDocument { proceso: procedure.title(),
                                          definition_hash: procedure.definition_hash.clone(),
                                          snapshot } }
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.document)
    }
}
