//! Wire shapes read from and written to the pharmacy backend.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a server-side record (medication or lot).
///
/// Produced by deserializing a lookup response, or from the key column of a
/// bulk sheet the backend resolves itself. Never from a typed field.
#[derive(Clone, Debug, Serialize, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Bulk rows name medications by key; the backend resolves it on upload.
    pub(crate) fn from_clave(clave: &str) -> Self {
        ReferenceId(clave.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReferenceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Backend ids are integers for medications and strings for some lots.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("empty reference id"))
            }
            Raw::Text(s) => Ok(ReferenceId(s)),
            Raw::Number(n) => Ok(ReferenceId(n.to_string())),
        }
    }
}

/// One row of `GET /api/medicamentos/buscar/?q=`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct MedicationHit {
    pub id: ReferenceId,
    pub clave: String,
    pub descripcion: String,
    #[serde(default)]
    pub presentacion: Option<String>,
}

impl MedicationHit {
    /// Presentation shown next to the hit; the backend falls back to `UNIDAD`.
    pub fn presentacion_label(&self) -> &str {
        self.presentacion.as_deref().unwrap_or("UNIDAD")
    }
}

/// Body of `GET /api/buscar_lote/{code}/`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LotRecord {
    pub id: ReferenceId,
    pub medicamento_nombre: String,
    #[serde(default)]
    pub clave: Option<String>,
    pub lote_numero: String,
    /// Expiry as rendered by the backend (`dd/mm/YYYY`).
    pub caducidad: String,
    pub cantidad_actual: u32,
}

/// Error envelope used by every endpoint on failure.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/entradas/guardar/`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct EntryCommitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub folio: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /salidas/`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseCommitResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_id_accepts_numbers_and_strings() {
        let hit: MedicationHit = serde_json::from_str(
            r#"{"id": 42, "clave": "010.000.0142.00", "descripcion": "Salmeterol"}"#,
        )
        .unwrap();
        assert_eq!(hit.id.as_str(), "42");
        assert_eq!(hit.presentacion_label(), "UNIDAD");

        let lot: LotRecord = serde_json::from_str(
            r#"{"id": "auto-B1011", "medicamento_nombre": "Enoxaparina",
                "lote_numero": "X15675A", "caducidad": "30/06/2026", "cantidad_actual": 12}"#,
        )
        .unwrap();
        assert_eq!(lot.id.as_str(), "auto-B1011");
        assert_eq!(lot.cantidad_actual, 12);
    }

    #[test]
    fn reference_id_rejects_blank_strings() {
        let res: Result<MedicationHit, _> =
            serde_json::from_str(r#"{"id": "  ", "clave": "x", "descripcion": "y"}"#);
        assert!(res.is_err());
    }
}
