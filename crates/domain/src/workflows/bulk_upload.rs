use std::io;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::{Candidate, LineItem, StagingCart},
    errors::RejectReason,
    inputs::ReferenceId,
};

use super::{require, Workflow};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Columns the backend requires in the spreadsheet, in template order.
pub const TEMPLATE_COLUMNS: [&str; 9] = [
    "clave",
    "descripcion",
    "lote",
    "cantidad",
    "precio",
    "caducidad",
    "origen",
    "contrato",
    "fuente_financiamiento",
];

pub const TEMPLATE_FILE_NAME: &str = "plantilla_carga_masiva.csv";

/// Template offered for download: header line plus one sample row.
pub fn template_csv() -> String {
    let sample = "010.000.0142.00,Salmeterol fluticasona. Polvo,3F6J,100,80.96,30/08/2026,ALMACEN A,IB/2261/2025,IMSS - BIENESTAR 32% 2025(U013)";
    format!("{}\n{}\n", TEMPLATE_COLUMNS.join(","), sample)
}

/// Spreadsheet upload (`carga masiva`). Rows are staged from the sheet's
/// CSV export so the operator can review them; the commit sends the sheet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BulkUpload;

/// One data row of the template. `fila` is the sheet row, header being row 1.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct BulkRow {
    #[serde(skip)]
    pub fila: u32,
    pub clave: String,
    #[serde(default)]
    pub descripcion: String,
    pub lote: String,
    pub cantidad: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub precio: Decimal,
    pub caducidad: String,
    #[serde(default)]
    pub origen: String,
    #[serde(default)]
    pub contrato: String,
    #[serde(default)]
    pub fuente_financiamiento: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct BulkDetail {
    pub fila: u32,
    pub clave: String,
    pub caducidad: String,
}

/// Parse template rows. A row that does not decode fails the whole read,
/// naming its sheet row.
pub fn read_rows<R: io::Read>(reader: R) -> Result<Vec<BulkRow>, RejectReason> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    reader
        .deserialize::<BulkRow>()
        .enumerate()
        .map(|(index, record)| {
            let fila = index as u32 + 2;
            let mut row = record.map_err(|e| RejectReason::InvalidUpload {
                message: format!("row {}: {}", fila, e),
            })?;
            row.fila = fila;
            Ok(row)
        })
        .collect()
}

impl Workflow for BulkUpload {
    const NAME: &'static str = "carga";
    // The backend merges repeated lots and reports them as warnings.
    const DEDUP_BY_LOT: bool = false;
    const PRICED: bool = true;

    type Lookup = BulkRow;
    type Input = ();
    type Detail = BulkDetail;
    type Header = UploadFile;
    type Payload = UploadFile;
    type Receipt = BulkUploadResults;

    fn candidate(
        row: &BulkRow,
        quantity: i64,
        _input: (),
    ) -> Result<Candidate<BulkDetail>, RejectReason> {
        require("clave", &row.clave)?;
        require("lote", &row.lote)?;

        let label = if row.descripcion.is_empty() {
            row.clave.clone()
        } else {
            row.descripcion.clone()
        };

        Ok(Candidate {
            reference_id: ReferenceId::from_clave(&row.clave),
            display_label: label,
            lot_code: Some(row.lote.clone()),
            quantity,
            max_quantity: None,
            unit_price: Some(row.precio),
            detail: BulkDetail {
                fila: row.fila,
                clave: row.clave.clone(),
                caducidad: row.caducidad.clone(),
            },
        })
    }

    fn payload(
        file: &UploadFile,
        _items: &[LineItem<BulkDetail>],
        _idempotency_key: Option<&str>,
    ) -> UploadFile {
        file.clone()
    }
}

impl StagingCart<BulkUpload> {
    /// Stage each row at its own quantity. Rows the cart refuses come back
    /// with their reason; the rest stay staged.
    pub async fn stage_rows(
        &mut self,
        rows: Vec<BulkRow>,
    ) -> Result<Vec<(BulkRow, RejectReason)>, RejectReason> {
        let mut refused = Vec::new();

        for row in rows {
            let staged = match BulkUpload::candidate(&row, row.cantidad, ()) {
                Ok(candidate) => self.add_item(candidate).await.map(|_| ()),
                Err(reason) => Err(reason),
            };

            match staged {
                Ok(()) => {}
                Err(RejectReason::CommitInProgress) => return Err(RejectReason::CommitInProgress),
                Err(reason) => {
                    tracing::debug!("Row {} not staged: {}", row.fila, reason);
                    refused.push((row, reason));
                }
            }
        }

        Ok(refused)
    }
}

/// A spreadsheet accepted for upload. Only the name is serialized.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct UploadFile {
    file_name: String,
    #[serde(skip)]
    bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, RejectReason> {
        let file_name = file_name.into();
        let lower = file_name.to_lowercase();

        if !ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Err(RejectReason::InvalidUpload {
                message: "select an Excel file (.xlsx or .xls)".to_string(),
            });
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(RejectReason::InvalidUpload {
                message: "file is too large, 10MB maximum".to_string(),
            });
        }

        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Body of `POST /api/carga-masiva/procesar/` (status 200 or 207).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkUploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub resultados: Option<BulkUploadResults>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkUploadResults {
    pub total: u32,
    pub exitosos: u32,
    pub actualizados: u32,
    #[serde(default)]
    pub errores: Vec<RowError>,
    #[serde(default)]
    pub advertencias: Vec<UploadWarning>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct RowError {
    pub fila: u32,
    pub clave: String,
    pub error: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum UploadWarning {
    ClavesSimilares {
        clave1: String,
        clave2: String,
        similitud: String,
        mensaje: String,
    },
    LoteDuplicado {
        clave: String,
        lote: String,
        filas: Vec<u32>,
        mensaje: String,
    },
    CaducidadProxima {
        fila: u32,
        clave: String,
        lote: String,
        mensaje: String,
    },
    #[serde(other)]
    Other,
}

impl UploadWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            UploadWarning::ClavesSimilares { .. } => "Similar keys",
            UploadWarning::LoteDuplicado { .. } => "Duplicate lot",
            UploadWarning::CaducidadProxima { .. } => "Expiry soon",
            UploadWarning::Other => "Warning",
        }
    }

    pub fn message(&self) -> String {
        match self {
            UploadWarning::ClavesSimilares {
                clave1,
                clave2,
                similitud,
                mensaje,
            } => format!("{} and {} are {} similar. {}", clave1, clave2, similitud, mensaje),
            UploadWarning::LoteDuplicado {
                clave,
                lote,
                filas,
                mensaje,
            } => {
                let filas: Vec<String> = filas.iter().map(u32::to_string).collect();
                format!("Key: {}, Lot: {} - {} (Rows: {})", clave, lote, mensaje, filas.join(", "))
            }
            UploadWarning::CaducidadProxima {
                fila,
                clave,
                lote,
                mensaje,
            } => format!("Row {} - Key: {}, Lot: {} - {}", fila, clave, lote, mensaje),
            UploadWarning::Other => String::new(),
        }
    }
}

/// One line of the result table shown after an upload.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ResultRow {
    pub kind: String,
    pub label: String,
    pub message: String,
}

impl BulkUploadResults {
    pub fn has_errors(&self) -> bool {
        !self.errores.is_empty()
    }

    /// Warnings first, then row errors, in server order.
    pub fn rows(&self) -> Vec<ResultRow> {
        let warnings = self.advertencias.iter().map(|warning| ResultRow {
            kind: "warning".to_string(),
            label: warning.kind().to_string(),
            message: warning.message(),
        });

        let errors = self.errores.iter().map(|error| ResultRow {
            kind: "error".to_string(),
            label: format!("Row {} ({})", error.fila, error.clave),
            message: error.error.clone(),
        });

        warnings.chain(errors).collect()
    }
}
